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

// Session controller: the Idle/Recording state machine that ties the
// sampler, buffer, location feed and exporter together

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::buffer::SampleBuffer;
use crate::config::RecorderConfig;
use crate::error::{RecorderError, Result};
use crate::exporter::{export_file_name, CsvExporter, TripExport};
use crate::label::{LabelState, Maneuver, PhonePosition};
use crate::location::{FeedStatus, LatestFix, LocationFeed};
use crate::protocol::{SessionMetadata, SessionStatus, StatusResponse};
use crate::sampler::{Clock, Sampler, SamplerHandle, SystemClock};
use crate::sensors::{MotionSource, PositionSource};
use crate::storage::ExportSink;

/// Outcome of a successful handoff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub session_id: String,
    pub file_name: String,
    pub sample_count: usize,
    pub bytes: usize,
    pub location: PathBuf,
}

struct ActiveSession {
    sampler: SamplerHandle,
    metadata: SessionMetadata,
    fixes_at_start: u64,
}

/// Export that has not reached the sink yet
struct PendingExport {
    export: TripExport,
    session_id: String,
}

struct ControllerState {
    phone_position: PhonePosition,
    active: Option<ActiveSession>,
    pending: Option<PendingExport>,
}

/// Orchestrates recording sessions.
///
/// Start and stop hold the state lock for their whole duration, so a stop
/// (including its export) always finishes before the next start begins.
/// Label changes bypass the lock entirely.
pub struct SessionController {
    label: Arc<LabelState>,
    location: LocationFeed,
    position_source: Arc<dyn PositionSource>,
    motion_source: Arc<dyn MotionSource>,
    exporter: CsvExporter,
    buffer: Arc<SampleBuffer>,
    clock: Arc<dyn Clock>,
    progress: Arc<watch::Sender<usize>>,
    config: RecorderConfig,
    state: Mutex<ControllerState>,
}

impl SessionController {
    pub fn new(
        config: RecorderConfig,
        motion_source: Arc<dyn MotionSource>,
        position_source: Arc<dyn PositionSource>,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        let (progress, _) = watch::channel(0usize);
        Self {
            label: Arc::new(LabelState::default()),
            location: LocationFeed::new(config.location.filter()),
            position_source,
            motion_source,
            exporter: CsvExporter::new(sink),
            buffer: Arc::new(SampleBuffer::new()),
            clock: Arc::new(SystemClock),
            progress: Arc::new(progress),
            state: Mutex::new(ControllerState {
                phone_position: config.recorder.phone_position,
                active: None,
                pending: None,
            }),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Request location permission and start the GPS feed.
    ///
    /// On denial recording still works; samples carry the zero fix.
    pub async fn enable_location(&self) -> Result<()> {
        self.location.start(self.position_source.clone()).await
    }

    /// Idle -> Recording: clear the buffer and activate the sampler.
    /// Returns the new session id.
    pub async fn start(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        if state.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        self.buffer.reset().await;
        self.progress.send_replace(0);
        self.label.set(Maneuver::default());

        let (ticks, sampler) = Sampler::new(
            self.label.clone(),
            self.location.reader(),
            self.buffer.clone(),
            state.phone_position,
        )
        .with_clock(self.clock.clone())
        .with_progress(self.config.recorder.notify_every, self.progress.clone())
        .activate();

        if let Err(e) = self
            .motion_source
            .subscribe(self.config.recorder.sample_interval(), ticks)
            .await
        {
            sampler.deactivate().await;
            self.buffer.freeze().await;
            warn!("Cannot start recording: {}", e);
            return Err(e);
        }

        let session_id = Uuid::new_v4().to_string();
        let metadata = SessionMetadata::new(
            session_id.clone(),
            state.phone_position,
            self.timestamp_rfc3339(),
        );

        state.active = Some(ActiveSession {
            sampler,
            metadata,
            fixes_at_start: self.location.fixes_received(),
        });

        info!(
            "Recording session {} started ({}, every {:?} from '{}' source)",
            session_id,
            state.phone_position,
            self.config.recorder.sample_interval(),
            self.motion_source.source_type()
        );

        Ok(session_id)
    }

    /// Recording -> Idle: deactivate the sampler, freeze and serialize the
    /// buffer, and hand the file to the sink.
    ///
    /// The session is stopped even when the handoff fails; in that case the
    /// export is kept for `retry_export` and `SinkUnavailable` is returned.
    pub async fn stop(&self) -> Result<ExportReport> {
        let mut state = self.state.lock().await;
        let ActiveSession {
            sampler,
            mut metadata,
            fixes_at_start,
        } = state.active.take().ok_or(RecorderError::NotRecording)?;

        // drain accepted ticks and unsubscribe strictly before reading the buffer
        let recorded = sampler.deactivate().await;
        self.buffer.freeze().await;
        let samples = self.buffer.snapshot().await;

        let stopped_at = self.clock.now_millis();
        metadata.finish(
            self.rfc3339(stopped_at),
            &samples,
            self.location.fixes_received().saturating_sub(fixes_at_start),
        );

        info!(
            "Recording session {} stopped with {} samples ({} this activation)",
            metadata.session_id,
            samples.len(),
            recorded
        );

        let export = TripExport {
            file_name: export_file_name(stopped_at),
            data: CsvExporter::serialize(&samples)?,
            sample_count: samples.len(),
            labels: metadata.to_labels(),
        };
        state.pending = Some(PendingExport {
            export,
            session_id: metadata.session_id.clone(),
        });

        self.handoff_pending(&mut state).await
    }

    /// Hand the last failed export to the sink again
    pub async fn retry_export(&self) -> Result<ExportReport> {
        let mut state = self.state.lock().await;
        if state.pending.is_none() {
            return Err(RecorderError::NothingToExport);
        }
        self.handoff_pending(&mut state).await
    }

    async fn handoff_pending(&self, state: &mut ControllerState) -> Result<ExportReport> {
        let pending = state.pending.as_ref().ok_or(RecorderError::NothingToExport)?;
        let location = self.exporter.handoff(&pending.export).await?;

        // the sink may have picked a free name next to the suggested one
        let file_name = location
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| pending.export.file_name.clone());
        let report = ExportReport {
            session_id: pending.session_id.clone(),
            file_name,
            sample_count: pending.export.sample_count,
            bytes: pending.export.data.len(),
            location,
        };
        state.pending = None;
        Ok(report)
    }

    /// Switch the live label; applies from the next tick on
    pub fn set_label(&self, label: Maneuver) {
        self.label.set(label);
        info!("Label -> {}", label);
    }

    pub fn label(&self) -> Maneuver {
        self.label.get()
    }

    /// Change the phone position for the next session
    pub async fn set_phone_position(&self, position: PhonePosition) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.active.is_some() {
            return Err(RecorderError::PositionLocked);
        }
        state.phone_position = position;
        info!("Phone position -> {}", position);
        Ok(())
    }

    pub async fn phone_position(&self) -> PhonePosition {
        self.state.lock().await.phone_position
    }

    pub async fn is_recording(&self) -> bool {
        self.state.lock().await.active.is_some()
    }

    pub async fn status(&self) -> StatusResponse {
        let state = self.state.lock().await;
        let feed = self.location.status().await;
        let fix = self.location.latest();

        StatusResponse {
            success: true,
            status: if state.active.is_some() {
                SessionStatus::Recording
            } else {
                SessionStatus::Idle
            },
            label: self.label.get(),
            phone_position: state.phone_position,
            sample_count: self.buffer.len(),
            gps_status: gps_status(feed, &fix),
            location_feed: feed,
            latest_fix: fix,
            session_id: state
                .active
                .as_ref()
                .map(|active| active.metadata.session_id.clone()),
            pending_export: state
                .pending
                .as_ref()
                .map(|pending| pending.export.file_name.clone()),
        }
    }

    /// Sample count, updated every `notify_every` samples
    pub fn progress(&self) -> watch::Receiver<usize> {
        self.progress.subscribe()
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    pub fn location(&self) -> &LocationFeed {
        &self.location
    }

    /// Stop and export an active session, then stop the location feed
    pub async fn shutdown(&self) -> Result<Option<ExportReport>> {
        let report = if self.is_recording().await {
            Some(self.stop().await)
        } else {
            None
        };
        self.location.stop().await;
        report.transpose()
    }

    fn timestamp_rfc3339(&self) -> String {
        self.rfc3339(self.clock.now_millis())
    }

    fn rfc3339(&self, epoch_ms: i64) -> String {
        Utc.timestamp_millis_opt(epoch_ms)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_default()
    }
}

/// Operator-facing GPS line
pub fn gps_status(feed: FeedStatus, fix: &LatestFix) -> String {
    match feed {
        FeedStatus::PermissionDenied => "Permission denied".to_string(),
        _ if fix.is_sentinel() => "Waiting...".to_string(),
        FeedStatus::Inactive => "Inactive (last fix kept)".to_string(),
        FeedStatus::Active => match fix.speed {
            Some(speed) => format!("Active: {:.1} m/s", speed),
            None => "Active: speed unknown".to_string(),
        },
    }
}
