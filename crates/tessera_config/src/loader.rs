//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::TesseraConfig;
use std::path::Path;

/// File name looked up inside a project directory.
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Loads and validates `tessera.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<TesseraConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `tessera.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<TesseraConfig, ConfigError> {
    let config: TesseraConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Checks value ranges and cross-field consistency.
pub fn validate_config(config: &TesseraConfig) -> Result<(), ConfigError> {
    let m = &config.machine;
    if m.width == 0 || m.height == 0 {
        return Err(invalid(format!(
            "machine dimensions must be positive, got {}x{}",
            m.width, m.height
        )));
    }
    // core 0 is the monitor, so at least one application core is needed
    if m.cores_per_chip < 2 {
        return Err(invalid(format!(
            "machine.cores_per_chip must be at least 2, got {}",
            m.cores_per_chip
        )));
    }
    if m.time_step_us == 0 {
        return Err(invalid("machine.time_step_us must be positive"));
    }
    if m.router_table_capacity == 0 {
        return Err(invalid("machine.router_table_capacity must be positive"));
    }
    for chip in &m.down_chips {
        if chip.x >= m.width || chip.y >= m.height {
            return Err(invalid(format!(
                "down chip {chip} lies outside the {}x{} machine",
                m.width, m.height
            )));
        }
    }
    for loc in &m.down_cores {
        if loc.chip.x >= m.width || loc.chip.y >= m.height || loc.core >= m.cores_per_chip {
            return Err(invalid(format!("down core {loc} does not exist")));
        }
    }
    if !(1..=32).contains(&config.keys.width_bits) {
        return Err(invalid(format!(
            "keys.width_bits must be within 1..=32, got {}",
            config.keys.width_bits
        )));
    }
    let t = &config.tags;
    if t.max_tag < t.notification_min || t.max_tag < t.reverse_min {
        return Err(invalid(format!(
            "tags.max_tag ({}) is below a pool minimum",
            t.max_tag
        )));
    }
    if config.execution.workers == 0 {
        return Err(invalid("execution.workers must be positive"));
    }
    if let Some((label, _)) = config.mapping.atoms_per_core.iter().find(|(_, n)| **n == 0) {
        return Err(invalid(format!(
            "mapping.atoms_per_core.{label} must be positive"
        )));
    }
    Ok(())
}
