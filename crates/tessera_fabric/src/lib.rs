//! Models of the target mesh: chips, cores, routers and links.
//!
//! A [`Fabric`] is a set of [`Chip`]s keyed by [`ChipCoord`](tessera_common::ChipCoord).
//! Each chip carries a list of working cores (core 0 is the monitor and is
//! never given to the application), a shared memory pool, and a [`Router`]
//! with up to six outgoing [`Link`]s and a bounded multicast table.
//!
//! Fabrics are built from a [`MachineConfig`](tessera_config::MachineConfig)
//! with [`Fabric::from_config`] or directly with [`Fabric::grid`], and may be
//! augmented with virtual chips standing in for off-mesh peripherals.

#![warn(missing_docs)]

pub mod chip;
pub mod fabric;
pub mod virtual_chip;

pub use chip::{Chip, ChipTemplate, Core, Link, Router, MONITOR_CORE};
pub use fabric::Fabric;
pub use virtual_chip::{VirtualChipSpec, VIRTUAL_CHIP_CORES};
