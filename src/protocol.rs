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

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::buffer::AnnotatedSample;
use crate::error::RecorderError;
use crate::label::{Maneuver, PhonePosition};
use crate::location::{FeedStatus, LatestFix};

/// Operator commands accepted by the control interface.
///
/// Plain text (`label braking`) and JSON (`{"command":"label","label":"Braking"}`)
/// forms are both accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum OperatorCommand {
    Start,
    Stop,
    Label { label: Maneuver },
    Position { position: PhonePosition },
    Status,
    Retry,
    Help,
    Quit,
}

impl FromStr for OperatorCommand {
    type Err = RecorderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.starts_with('{') {
            return serde_json::from_str(line)
                .map_err(|e| RecorderError::InvalidCommand(e.to_string()));
        }

        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        let command = match verb.to_lowercase().as_str() {
            "start" => OperatorCommand::Start,
            "stop" => OperatorCommand::Stop,
            "status" => OperatorCommand::Status,
            "retry" => OperatorCommand::Retry,
            "help" | "?" => OperatorCommand::Help,
            "quit" | "exit" => OperatorCommand::Quit,
            "label" => OperatorCommand::Label { label: arg.parse()? },
            "position" => OperatorCommand::Position {
                position: arg.parse()?,
            },
            // a bare label name switches the label
            other => match other.parse::<Maneuver>() {
                Ok(label) if arg.is_empty() => OperatorCommand::Label { label },
                _ => {
                    return Err(RecorderError::InvalidCommand(format!(
                        "unknown command '{}'",
                        line
                    )))
                }
            },
        };

        Ok(command)
    }
}

pub const HELP_TEXT: &str = "commands: start | stop | label <cruising|braking|left|right|pullover> | \
position <mount|cup|bag> | status | retry | quit";

/// Response message for operator commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_count: Option<usize>,
}

impl CommandResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            session_id: None,
            export_path: None,
            sample_count: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            session_id: None,
            export_path: None,
            sample_count: None,
        }
    }
}

/// Recording lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Recording,
}

/// Response message for status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: SessionStatus,
    pub label: Maneuver,
    pub phone_position: PhonePosition,
    pub sample_count: usize,
    pub gps_status: String,
    pub location_feed: FeedStatus,
    pub latest_fix: LatestFix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_export: Option<String>,
}

/// One reply line written by the control interface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlReply {
    Status(StatusResponse),
    Command(CommandResponse),
}

/// Session metadata stored alongside the export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub phone_position: PhonePosition,
    pub start_time: String,
    pub end_time: Option<String>,
    pub sample_count: usize,
    pub label_counts: BTreeMap<String, usize>,
    pub gps_fixes: u64,
}

impl SessionMetadata {
    pub fn new(session_id: String, phone_position: PhonePosition, start_time: String) -> Self {
        Self {
            session_id,
            phone_position,
            start_time,
            end_time: None,
            sample_count: 0,
            label_counts: BTreeMap::new(),
            gps_fixes: 0,
        }
    }

    /// Fill in the totals from the frozen buffer
    pub fn finish(&mut self, end_time: String, samples: &[AnnotatedSample], gps_fixes: u64) {
        self.end_time = Some(end_time);
        self.sample_count = samples.len();
        self.gps_fixes = gps_fixes;
        self.label_counts.clear();
        for sample in samples {
            *self
                .label_counts
                .entry(sample.label.as_str().to_string())
                .or_insert(0) += 1;
        }
    }

    /// Flatten into sink labels
    pub fn to_labels(&self) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("session_id".to_string(), self.session_id.clone());
        labels.insert(
            "phone_position".to_string(),
            self.phone_position.as_str().to_string(),
        );
        labels.insert("start_time".to_string(), self.start_time.clone());
        if let Some(end_time) = &self.end_time {
            labels.insert("end_time".to_string(), end_time.clone());
        }
        labels.insert("sample_count".to_string(), self.sample_count.to_string());
        labels.insert("gps_fixes".to_string(), self.gps_fixes.to_string());
        for (label, count) in &self.label_counts {
            labels.insert(format!("label_count.{}", label), count.to_string());
        }
        labels
    }
}
