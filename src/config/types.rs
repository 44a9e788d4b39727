// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration types for maneuver-recorder

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::label::PhonePosition;
use crate::sensors::{LocationAccuracy, PositionFilter};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RecorderConfig {
    #[serde(default)]
    pub recorder: RecorderSettings,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Sampling settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderSettings {
    /// Accelerometer tick interval
    #[serde(default = "default_sample_interval")]
    pub sample_interval_ms: u64,

    /// Report the running sample count every N samples
    #[serde(default = "default_notify_every")]
    pub notify_every: usize,

    #[serde(default)]
    pub phone_position: PhonePosition,

    #[serde(default = "default_source")]
    pub motion_source: String, // "simulated"
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval(),
            notify_every: default_notify_every(),
            phone_position: PhonePosition::default(),
            motion_source: default_source(),
        }
    }
}

impl RecorderSettings {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// GPS subscription settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub accuracy: LocationAccuracy,

    /// Minimum time between updates
    #[serde(default = "default_min_time")]
    pub min_time_ms: u64,

    /// Minimum distance between updates
    #[serde(default = "default_min_distance")]
    pub min_distance_m: f64,

    #[serde(default = "default_source")]
    pub source: String, // "simulated"
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            accuracy: LocationAccuracy::default(),
            min_time_ms: default_min_time(),
            min_distance_m: default_min_distance(),
            source: default_source(),
        }
    }
}

impl LocationConfig {
    pub fn filter(&self) -> PositionFilter {
        PositionFilter {
            accuracy: self.accuracy,
            min_time: Duration::from_millis(self.min_time_ms),
            min_distance_m: self.min_distance_m,
        }
    }
}

/// Export sink configuration with backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Backend type: "filesystem" or "share"
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default)]
    pub filesystem: Option<FilesystemConfig>,

    #[serde(default)]
    pub share: Option<ShareConfig>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            filesystem: Some(FilesystemConfig::default()),
            share: None,
        }
    }
}

impl SinkConfig {
    pub fn as_filesystem(&self) -> Option<&FilesystemConfig> {
        self.filesystem.as_ref()
    }

    pub fn as_share(&self) -> Option<&ShareConfig> {
        self.share.as_ref()
    }

    /// Point whichever backend is selected at `base_path`
    pub fn set_base_path(&mut self, base_path: String) {
        match self.backend.as_str() {
            "share" => {
                self.share.get_or_insert_with(ShareConfig::default).base_path = base_path;
            }
            _ => {
                self.filesystem
                    .get_or_insert_with(FilesystemConfig::default)
                    .base_path = base_path;
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    pub base_path: String,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShareConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,

    #[serde(default = "default_share_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            command: default_share_command(),
            args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"

    #[serde(default = "default_log_format")]
    pub format: String, // "text"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_true() -> bool { true }
fn default_sample_interval() -> u64 { 20 }
fn default_notify_every() -> usize { 50 }
fn default_source() -> String { "simulated".to_string() }
fn default_min_time() -> u64 { 1000 }
fn default_min_distance() -> f64 { 1.0 }
fn default_backend() -> String { "filesystem".to_string() }
fn default_base_path() -> String { "./trips".to_string() }
fn default_share_command() -> String { "xdg-open".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
