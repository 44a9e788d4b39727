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

// Sink factory for creating export sinks from configuration

use super::backend::ExportSink;
use super::filesystem::FilesystemSink;
use super::share::ShareSink;
use crate::config::SinkConfig;
use anyhow::{bail, Result};
use std::sync::Arc;

pub struct SinkFactory;

impl SinkFactory {
    /// Create export sink from configuration
    pub fn create(config: &SinkConfig) -> Result<Arc<dyn ExportSink>> {
        match config.backend.as_str() {
            "filesystem" => {
                let sink_config = config
                    .as_filesystem()
                    .ok_or_else(|| anyhow::anyhow!("Filesystem config missing"))?;

                let sink = FilesystemSink::new(sink_config.clone())?;
                Ok(Arc::new(sink))
            }

            "share" => {
                let sink_config = config
                    .as_share()
                    .ok_or_else(|| anyhow::anyhow!("Share config missing"))?;

                let sink = ShareSink::new(sink_config.clone())?;
                Ok(Arc::new(sink))
            }

            unknown => bail!(
                "Unknown export sink: '{}'. Supported: filesystem, share",
                unknown
            ),
        }
    }
}
