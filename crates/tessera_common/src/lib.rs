//! Shared foundational types used across the Tessera mapping toolchain.
//!
//! This crate provides the opaque ID newtypes, fabric coordinates and link
//! directions, resource-cost vectors, content hashing, and the pipeline-wide
//! [`MapError`] / [`MapResult`] types.

#![warn(missing_docs)]

pub mod coord;
pub mod error;
pub mod hash;
pub mod ids;
pub mod resource;

pub use coord::{ChipCoord, Direction, Location, ParseCoordError};
pub use error::{MapError, MapResult, RemoteError};
pub use hash::ContentHash;
pub use ids::{ConnectionId, PartitionedConnectionId, SliceId, UnitId};
pub use resource::{Excess, Resource, ResourceCost, TagKind};
