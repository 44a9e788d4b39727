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

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

use crate::error::RecorderError;
use crate::protocol::{CommandResponse, ControlReply, OperatorCommand, HELP_TEXT};
use crate::session::{ExportReport, SessionController};

/// Line-oriented operator interface.
///
/// Reads one command per line and answers each with one JSON line. Commands
/// are handled in arrival order, so a label change typed after `start` always
/// lands in that session.
pub struct ControlInterface {
    controller: Arc<SessionController>,
}

impl ControlInterface {
    pub fn new(controller: Arc<SessionController>) -> Self {
        Self { controller }
    }

    /// Run until `quit` or end of input
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        info!("Control interface ready");

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let (reply, quit) = self.handle_line(&line).await;
            let mut out = serde_json::to_vec(&reply)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;

            if quit {
                info!("Quit requested");
                break;
            }
        }

        Ok(())
    }

    /// Parse and execute one line; the flag is set for `quit`
    pub async fn handle_line(&self, line: &str) -> (ControlReply, bool) {
        match line.parse::<OperatorCommand>() {
            Ok(command) => {
                let quit = command == OperatorCommand::Quit;
                (self.handle_command(command).await, quit)
            }
            Err(e) => (ControlReply::Command(CommandResponse::error(e.to_string())), false),
        }
    }

    pub async fn handle_command(&self, command: OperatorCommand) -> ControlReply {
        info!("Processing command: {:?}", command);

        let response = match command {
            OperatorCommand::Start => match self.controller.start().await {
                Ok(session_id) => {
                    let mut response = CommandResponse::success("Recording started");
                    response.session_id = Some(session_id);
                    response
                }
                Err(e) => failure(e),
            },
            OperatorCommand::Stop => export_response(self.controller.stop().await),
            OperatorCommand::Retry => export_response(self.controller.retry_export().await),
            OperatorCommand::Label { label } => {
                self.controller.set_label(label);
                CommandResponse::success(format!("Label set to {}", label))
            }
            OperatorCommand::Position { position } => {
                match self.controller.set_phone_position(position).await {
                    Ok(()) => CommandResponse::success(format!("Phone position set to {}", position)),
                    Err(e) => failure(e),
                }
            }
            OperatorCommand::Status => return ControlReply::Status(self.controller.status().await),
            OperatorCommand::Help => CommandResponse::success(HELP_TEXT),
            OperatorCommand::Quit => CommandResponse::success("Bye"),
        };

        ControlReply::Command(response)
    }
}

fn failure(e: RecorderError) -> CommandResponse {
    error!("Command failed: {}", e);
    CommandResponse::error(e.to_string())
}

fn export_response(result: crate::error::Result<ExportReport>) -> CommandResponse {
    match result {
        Ok(report) => {
            let mut response = CommandResponse::success(format!(
                "Saved {} samples to {}",
                report.sample_count, report.file_name
            ));
            response.session_id = Some(report.session_id);
            response.export_path = Some(report.location.display().to_string());
            response.sample_count = Some(report.sample_count);
            response
        }
        Err(e @ RecorderError::SinkUnavailable(_)) => {
            CommandResponse::error(format!("{}; recording kept, use 'retry' to export again", e))
        }
        Err(e) => failure(e),
    }
}
