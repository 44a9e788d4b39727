// Configuration loader with environment variable substitution

use super::types::*;
use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file with environment variable substitution
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RecorderConfig> {
        let content = std::fs::read_to_string(path.as_ref())
            .context("Failed to read config file")?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<RecorderConfig> {
        let content = Self::substitute_env_vars(content);

        let config: RecorderConfig = serde_yaml::from_str(&content)
            .context("Failed to parse YAML configuration")?;

        Self::validate(&config)?;

        Ok(config)
    }

    /// Substitute ${VAR} and ${VAR:-default} patterns with environment variables
    ///
    /// Examples:
    /// - ${HOME} -> /home/user
    /// - ${TRIP_DIR:-./trips} -> ./trips (if TRIP_DIR not set)
    fn substitute_env_vars(content: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"\$\{([^}:]+)(?::-([^}]+))?\}").expect("valid env var pattern")
        });

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default_value = caps.get(2).map(|m| m.as_str());

            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    // Keep original if no default and var not found
                    None => format!("${{{}}}", var_name),
                },
            }
        })
        .to_string()
    }

    /// Validate configuration
    pub fn validate(config: &RecorderConfig) -> Result<()> {
        if config.recorder.sample_interval_ms == 0 {
            bail!("recorder.sample_interval_ms must be > 0");
        }

        if config.recorder.notify_every == 0 {
            bail!("recorder.notify_every must be > 0");
        }

        if config.recorder.motion_source != "simulated" {
            bail!(
                "Unknown motion source: '{}'. Supported: simulated",
                config.recorder.motion_source
            );
        }

        if config.location.min_time_ms == 0 {
            bail!("location.min_time_ms must be > 0");
        }

        let min_distance = config.location.min_distance_m;
        if min_distance.is_nan() || min_distance < 0.0 {
            bail!("location.min_distance_m must be >= 0");
        }

        if config.location.source != "simulated" {
            bail!(
                "Unknown location source: '{}'. Supported: simulated",
                config.location.source
            );
        }

        match config.sink.backend.as_str() {
            "filesystem" => {
                if config.sink.as_filesystem().is_none() {
                    bail!("filesystem sink selected but filesystem config missing");
                }
            }
            "share" => match config.sink.as_share() {
                None => bail!("share sink selected but share config missing"),
                Some(share) if share.command.trim().is_empty() => {
                    bail!("sink.share.command cannot be empty")
                }
                Some(_) => {}
            },
            unknown => bail!("Unknown sink: '{}'. Supported: filesystem, share", unknown),
        }

        match config.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => bail!("Unknown logging.level: '{}'", other),
        }

        Ok(())
    }
}
