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

// Maneuver Recorder
//
// Records labeled motion data for driving-behavior analysis:
// - 50 Hz accelerometer ticks are the heartbeat of a session
// - each tick is tagged with the operator's live maneuver label and the
//   freshest GPS fix from an independent ~1 Hz feed
// - samples accumulate in an append-only buffer for the session
// - on stop the buffer is serialized to a trip CSV and handed to an
//   export sink (local directory or share tool)

pub mod buffer;
pub mod config;
pub mod control;
pub mod error;
pub mod exporter;
pub mod label;
pub mod location;
pub mod protocol;
pub mod sampler;
pub mod sensors;
pub mod session;
pub mod storage;

// Re-export main types
pub use buffer::{AnnotatedSample, SampleBuffer};
pub use config::{load_config, load_config_with_env, RecorderConfig};
pub use control::ControlInterface;
pub use error::RecorderError;
pub use exporter::{export_file_name, CsvExporter, TripExport, CSV_HEADER};
pub use label::{LabelState, Maneuver, PhonePosition};
pub use location::{FeedStatus, FixReader, LatestFix, LocationFeed};
pub use protocol::{
    CommandResponse, ControlReply, OperatorCommand, SessionMetadata, SessionStatus,
    StatusResponse,
};
pub use sampler::{Clock, Sampler, SamplerHandle, SystemClock, TickSender};
pub use sensors::{
    AccelReading, MotionSource, PermissionStatus, PositionFilter, PositionSource, PositionUpdate,
};
pub use session::{ExportReport, SessionController};
pub use storage::{ExportSink, SinkFactory};
