//! Application and partitioned graphs.
//!
//! Callers describe their application as an [`ApplicationGraph`] of
//! [`Unit`]s joined by [`Connection`]s. Each unit delegates its resource cost
//! and state layout to a [`UnitModel`], and each connection decides which atom
//! pairs it links through a [`ConnectivityRule`].
//!
//! The partitioner turns the application graph into a [`PartitionedGraph`] of
//! [`Slice`]s (contiguous atom ranges that fit one core) and
//! [`PartitionedConnection`]s between them.

#![warn(missing_docs)]

pub mod atoms;
pub mod connectivity;
pub mod error;
pub mod graph;
pub mod model;
pub mod partitioned;
pub mod unit;

pub use atoms::AtomRange;
pub use connectivity::{AllToAll, ConnectivityRule, FixedProbability, FromList, OneToOne};
pub use error::GraphError;
pub use graph::{ApplicationGraph, Connection};
pub use model::{ComposedModel, LinearModel, ModelComponent, ParameterBlock, UnitModel};
pub use partitioned::{PartitionedConnection, PartitionedGraph, Slice};
pub use unit::{NotificationTagRequest, ReverseTagRequest, Unit};
