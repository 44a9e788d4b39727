// Configuration module for maneuver-recorder
//
// Provides:
// - YAML configuration file loading
// - Environment variable substitution
// - Configuration validation
// - Default values

pub mod types;
mod loader;

pub use types::*;
pub use loader::ConfigLoader;

use anyhow::{Context, Result};
use std::path::Path;

use crate::label::PhonePosition;

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    ConfigLoader::load(path).context("Failed to load configuration")
}

/// Load configuration with environment variable overrides
pub fn load_config_with_env<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
    let mut config = load_config(path)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply `TRIP_OUTPUT_DIR` and `TRIP_PHONE_POSITION` on top of `config`
pub fn apply_env_overrides(config: &mut RecorderConfig) -> Result<()> {
    if let Ok(output_dir) = std::env::var("TRIP_OUTPUT_DIR") {
        config.sink.set_base_path(output_dir);
    }

    if let Ok(position) = std::env::var("TRIP_PHONE_POSITION") {
        config.recorder.phone_position = position
            .parse::<PhonePosition>()
            .context("Invalid TRIP_PHONE_POSITION")?;
    }

    Ok(())
}
