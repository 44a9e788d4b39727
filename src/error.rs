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

use thiserror::Error;

/// Failures surfaced by the recording engine.
///
/// None of these are fatal to the process. The session controller reports
/// each one to the operator as a single response and stays usable.
#[derive(Error, Debug)]
pub enum RecorderError {
    /// Location permission was refused; the feed stays inactive and samples
    /// carry the zero fix.
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Motion sensor unavailable: {0}")]
    SensorUnavailable(String),

    /// The export sink could not take the file. The serialized export is kept
    /// and can be handed off again with a retry.
    #[error("Export sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Session already recording")]
    AlreadyRecording,

    #[error("Session not recording")]
    NotRecording,

    #[error("Sample buffer is frozen")]
    BufferFrozen,

    #[error("Phone position cannot change while recording")]
    PositionLocked,

    #[error("No export pending")]
    NothingToExport,

    #[error("Malformed trip CSV: {0}")]
    MalformedCsv(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RecorderError>;
