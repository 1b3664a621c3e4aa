//! Execution orchestration for the Tessera toolchain.
//!
//! Takes a graph through [`tessera_map`], then generates per-slice data on a
//! bounded worker pool, loads it through a [`RemoteExecutor`], starts and
//! stops the application, and reads back provenance. The
//! [`VirtualBoardExecutor`] stands in for hardware.
//!
//! ```ignore
//! use tessera_exec::{RunLength, Simulator, VirtualBoardExecutor};
//!
//! let mut sim = Simulator::new(config, VirtualBoardExecutor::new());
//! let summary = sim.run(&graph, RunLength::Bounded(50.0), &sink)?;
//! sim.stop()?;
//! ```

#![warn(missing_docs)]

pub mod datagen;
pub mod executor;
pub mod simulator;
pub mod targets;
pub mod timing;
pub mod virtual_board;

pub use datagen::{generate_and_load, GenerationReport};
pub use executor::{LoadJob, ProvenanceItem, RemoteExecutor};
pub use simulator::{ExecutionState, FabricSettings, Phase, ReportSettings, RunSummary, Simulator};
pub use targets::{CoreSubsets, ExecutableTargets};
pub use timing::{time_steps, RunLength};
pub use virtual_board::{Fault, VirtualBoardExecutor};
