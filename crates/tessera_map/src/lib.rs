//! Mapping engine for the Tessera toolchain.
//!
//! This crate takes an [`ApplicationGraph`](tessera_graph::ApplicationGraph)
//! and a [`Fabric`](tessera_fabric::Fabric) and compiles the graph into
//! concrete artifacts: slice placements, routing keys, per-chip multicast
//! routing tables, and I/O tags.
//!
//! # Pipeline
//!
//! 1. **Partition**: split units into slices that fit one core
//! 2. **Edge filter**: drop partitioned connections that carry no traffic
//! 3. **Place**: assign every slice a `(chip, core)`, synthesizing virtual chips
//! 4. **Keys**: give every partitioned connection a key and mask
//! 5. **Route**: build multicast trees and compile routing tables
//! 6. **Tags**: allocate notification and reverse tags
//!
//! Every stage consumes the complete output of the previous one, and the
//! first fatal error aborts the run.
//!
//! # Usage
//!
//! ```ignore
//! use tessera_map::map_graph;
//!
//! let mapping = map_graph(&graph, &mut fabric, &config, &sink)?;
//! println!("{}", mapping.fingerprint());
//! ```

#![warn(missing_docs)]

pub mod edge_filter;
pub mod keys;
pub mod partition;
pub mod pipeline;
pub mod placement;
pub mod routing;
pub mod tags;

pub use edge_filter::filter_edges;
pub use keys::{allocator_for, AtomBlockKeys, KeyAllocator, KeyAndMask, KeyAssignments, SequentialKeys};
pub use partition::partition;
pub use pipeline::{map_graph, Mapper, Mapping, StageTimings};
pub use placement::{place, Placements};
pub use routing::{route, validate_routes, MulticastEntry, RoutingTable, RoutingTables};
pub use tags::{allocate_tags, NotificationTag, ReverseTag, TagAllocations, TagPool};
