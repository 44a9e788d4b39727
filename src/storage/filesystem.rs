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

// Filesystem sink implementation

use super::backend::ExportSink;
use crate::config::FilesystemConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Writes trip files (and a metadata sidecar) into a local directory
pub struct FilesystemSink {
    base_path: PathBuf,
}

impl FilesystemSink {
    pub fn new(config: FilesystemConfig) -> Result<Self> {
        let base_path = PathBuf::from(&config.base_path);

        info!("Initializing filesystem sink at: {}", base_path.display());

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Ensure base directory exists
    async fn ensure_base_directory(&self) -> Result<()> {
        if !self.base_path.exists() {
            info!("Creating base directory: {}", self.base_path.display());
            fs::create_dir_all(&self.base_path)
                .await
                .context("Failed to create base directory")?;
        }
        Ok(())
    }

    /// `trip_123.csv`, then `trip_123_1.csv`, `trip_123_2.csv`, ...
    fn candidate_name(file_name: &str, attempt: u32) -> String {
        if attempt == 0 {
            return file_name.to_string();
        }
        let name = Path::new(file_name);
        let stem = name
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        match name.extension() {
            Some(ext) => format!("{}_{}.{}", stem, attempt, ext.to_string_lossy()),
            None => format!("{}_{}", stem, attempt),
        }
    }

    /// Create a new export file, never replacing an earlier one
    async fn create_export_file(&self, file_name: &str) -> Result<(PathBuf, fs::File)> {
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = self.base_path.join(Self::candidate_name(file_name, attempt));
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} exists, trying next name", path.display());
                }
                Err(e) => {
                    return Err(e)
                        .context(format!("Failed to create file: {}", path.display()))
                }
            }
        }
        bail!("No free file name for {} in {}", file_name, self.base_path.display())
    }

    /// `trip_123.csv` -> `trip_123.meta.json`
    fn get_metadata_path(&self, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        self.base_path.join(format!("{}.meta.json", stem))
    }

    async fn write_file(path: &Path, data: &[u8]) -> Result<()> {
        let mut file = fs::File::create(path)
            .await
            .context(format!("Failed to create file: {}", path.display()))?;
        file.write_all(data).await.context("Failed to write data")?;
        file.flush().await.context("Failed to flush data")?;
        Ok(())
    }
}

#[async_trait]
impl ExportSink for FilesystemSink {
    async fn initialize(&self) -> Result<()> {
        self.ensure_base_directory().await
    }

    async fn is_available(&self) -> bool {
        // Check if base directory is accessible and writable
        match fs::metadata(&self.base_path).await {
            Ok(metadata) if metadata.is_dir() => {
                let probe = self.base_path.join(".availability_probe");
                match fs::File::create(&probe).await {
                    Ok(mut f) => {
                        if let Err(e) = f.write_all(b"probe").await {
                            warn!("Export directory not writable: {}", e);
                            return false;
                        }
                        let _ = fs::remove_file(&probe).await;
                        true
                    }
                    Err(e) => {
                        warn!("Export directory not writable: {}", e);
                        false
                    }
                }
            }
            Ok(_) => {
                warn!(
                    "Export path is not a directory: {}",
                    self.base_path.display()
                );
                false
            }
            Err(e) => {
                warn!(
                    "Cannot access export directory {}: {}",
                    self.base_path.display(),
                    e
                );
                false
            }
        }
    }

    async fn write_export(
        &self,
        file_name: &str,
        data: &[u8],
        labels: &HashMap<String, String>,
    ) -> Result<PathBuf> {
        self.ensure_base_directory().await?;

        let (file_path, mut file) = self.create_export_file(file_name).await?;
        debug!("Writing {} bytes to {}", data.len(), file_path.display());
        file.write_all(data).await.context("Failed to write data")?;
        file.flush().await.context("Failed to flush data")?;

        if !labels.is_empty() {
            let written_name = file_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_name.to_string());
            let metadata_path = self.get_metadata_path(&written_name);
            debug!("Writing metadata to {}", metadata_path.display());

            let metadata_json =
                serde_json::to_string_pretty(labels).context("Failed to serialize metadata")?;
            Self::write_file(&metadata_path, metadata_json.as_bytes()).await?;
        }

        info!("Wrote {} bytes to {}", data.len(), file_path.display());

        Ok(file_path)
    }

    fn backend_type(&self) -> &str {
        "filesystem"
    }
}
