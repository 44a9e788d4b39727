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

// Share sink: persist the export, then hand it to a user-facing share tool

use super::backend::ExportSink;
use super::filesystem::FilesystemSink;
use crate::config::{FilesystemConfig, ShareConfig};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// Stages the file on disk and launches `command [args...] <path>`
pub struct ShareSink {
    staging: FilesystemSink,
    command: String,
    args: Vec<String>,
}

impl ShareSink {
    pub fn new(config: ShareConfig) -> Result<Self> {
        if config.command.trim().is_empty() {
            bail!("share sink requires a command");
        }

        let staging = FilesystemSink::new(FilesystemConfig {
            base_path: config.base_path,
        })?;

        Ok(Self {
            staging,
            command: config.command,
            args: config.args,
        })
    }

    /// Locate the share command the way a shell would
    fn resolve_command(&self) -> Option<PathBuf> {
        let command = Path::new(&self.command);
        if command.components().count() > 1 {
            return command.is_file().then(|| command.to_path_buf());
        }

        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(&self.command))
            .find(|candidate| candidate.is_file())
    }
}

#[async_trait]
impl ExportSink for ShareSink {
    async fn initialize(&self) -> Result<()> {
        self.staging.initialize().await?;
        if self.resolve_command().is_none() {
            warn!(
                "Share command '{}' not found, exports will be reported unavailable",
                self.command
            );
        }
        Ok(())
    }

    async fn is_available(&self) -> bool {
        if self.resolve_command().is_none() {
            warn!("Sharing is not available: '{}' not found", self.command);
            return false;
        }
        self.staging.is_available().await
    }

    async fn write_export(
        &self,
        file_name: &str,
        data: &[u8],
        labels: &HashMap<String, String>,
    ) -> Result<PathBuf> {
        let path = self.staging.write_export(file_name, data, labels).await?;

        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(&path)
            .status()
            .await
            .context(format!("Failed to launch share command '{}'", self.command))?;

        if !status.success() {
            bail!("Share command '{}' exited with {}", self.command, status);
        }

        info!("Shared {} via '{}'", path.display(), self.command);
        Ok(path)
    }

    fn backend_type(&self) -> &str {
        "share"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn share_config(dir: &TempDir, command: &str) -> ShareConfig {
        ShareConfig {
            base_path: dir.path().to_string_lossy().to_string(),
            command: command.to_string(),
            args: vec![],
        }
    }

    #[test]
    fn test_empty_command_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(ShareSink::new(share_config(&dir, " ")).is_err());
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let sink = ShareSink::new(share_config(&dir, "definitely-not-a-share-tool")).unwrap();
        sink.initialize().await.unwrap();
        assert!(!sink.is_available().await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_share_runs_command_with_path() {
        let dir = TempDir::new().unwrap();
        let sink = ShareSink::new(share_config(&dir, "true")).unwrap();
        sink.initialize().await.unwrap();
        assert!(sink.is_available().await);

        let path = sink
            .write_export("trip_7.csv", b"timestamp\n", &HashMap::new())
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command_is_an_error() {
        let dir = TempDir::new().unwrap();
        let sink = ShareSink::new(share_config(&dir, "false")).unwrap();
        sink.initialize().await.unwrap();

        let result = sink
            .write_export("trip_8.csv", b"timestamp\n", &HashMap::new())
            .await;
        assert!(result.is_err());
        // the staged copy is still on disk
        assert!(dir.path().join("trip_8.csv").exists());
    }
}
