//! Parsing and validation of `tessera.toml` configuration files.
//!
//! The file describes the target machine (mesh size, per-core budgets, down
//! chips and cores), the algorithm chosen for each mapping stage, key and tag
//! pool limits, reporting switches, and execution settings. Every field has a
//! default, so an empty file is a valid configuration.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
