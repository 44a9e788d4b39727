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

// Export sink trait for finished trip files

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

/// Destination for a finished trip export.
///
/// A sink receives the complete encoded file once per session (or again on
/// an operator retry). Sinks never retry on their own.
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Prepare the sink (create directories, check tools)
    async fn initialize(&self) -> Result<()>;

    /// Whether the sink can take a file right now.
    /// Checked before every handoff.
    async fn is_available(&self) -> bool;

    /// Persist or share one export
    ///
    /// # Arguments
    /// * `file_name` - Suggested name, `trip_<epoch-ms>.csv`
    /// * `data` - Encoded file contents
    /// * `labels` - Session metadata to keep alongside the file
    ///
    /// Returns where the file ended up.
    async fn write_export(
        &self,
        file_name: &str,
        data: &[u8],
        labels: &HashMap<String, String>,
    ) -> Result<PathBuf>;

    /// Get sink type identifier
    fn backend_type(&self) -> &str;
}
