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

/// Session controller state machine and sample merging tests
///
use async_trait::async_trait;
use maneuver_recorder::config::FilesystemConfig;
use maneuver_recorder::sensors::{ChannelMotionSource, ChannelPositionSource};
use maneuver_recorder::storage::FilesystemSink;
use maneuver_recorder::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Advances 20 ms on every read, like a 50 Hz tick source
struct StepClock(AtomicI64);

impl Clock for StepClock {
    fn now_millis(&self) -> i64 {
        self.0.fetch_add(20, Ordering::Relaxed)
    }
}

/// Filesystem sink that can be switched off
struct SwitchableSink {
    inner: FilesystemSink,
    available: AtomicBool,
}

#[async_trait]
impl ExportSink for SwitchableSink {
    async fn initialize(&self) -> anyhow::Result<()> {
        self.inner.initialize().await
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst) && self.inner.is_available().await
    }

    async fn write_export(
        &self,
        file_name: &str,
        data: &[u8],
        labels: &HashMap<String, String>,
    ) -> anyhow::Result<PathBuf> {
        self.inner.write_export(file_name, data, labels).await
    }

    fn backend_type(&self) -> &str {
        "switchable"
    }
}

struct Harness {
    controller: Arc<SessionController>,
    motion: Arc<ChannelMotionSource>,
    position: Arc<ChannelPositionSource>,
    sink: Arc<SwitchableSink>,
    _dir: TempDir,
}

/// Reports the same instant forever
struct FixedClock(i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

async fn harness_with(
    motion: ChannelMotionSource,
    permission: PermissionStatus,
    config: RecorderConfig,
) -> Harness {
    harness_with_clock(
        motion,
        permission,
        config,
        Arc::new(StepClock(AtomicI64::new(1_700_000_000_000))),
    )
    .await
}

async fn harness_with_clock(
    motion: ChannelMotionSource,
    permission: PermissionStatus,
    config: RecorderConfig,
    clock: Arc<dyn Clock>,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(SwitchableSink {
        inner: FilesystemSink::new(FilesystemConfig {
            base_path: dir.path().to_string_lossy().to_string(),
        })
        .unwrap(),
        available: AtomicBool::new(true),
    });
    sink.initialize().await.unwrap();

    let motion = Arc::new(motion);
    let position = Arc::new(ChannelPositionSource::new(permission));
    let controller = Arc::new(
        SessionController::new(config, motion.clone(), position.clone(), sink.clone())
            .with_clock(clock),
    );

    Harness {
        controller,
        motion,
        position,
        sink,
        _dir: dir,
    }
}

async fn harness() -> Harness {
    harness_with(
        ChannelMotionSource::new(),
        PermissionStatus::Granted,
        RecorderConfig::default(),
    )
    .await
}

async fn wait_for_samples(h: &Harness, n: usize) {
    for _ in 0..400 {
        if h.controller.buffer().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected {} samples, buffer holds {}",
        n,
        h.controller.buffer().len()
    );
}

async fn wait_for_fixes(h: &Harness, n: u64) {
    for _ in 0..400 {
        if h.controller.location().fixes_received() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("expected {} GPS fixes", n);
}

async fn tick(h: &Harness, x: f64) {
    let before = h.controller.buffer().len();
    assert!(h.motion.push(AccelReading::new(x, 0.0, 9.81)).await);
    wait_for_samples(h, before + 1).await;
}

async fn gps(h: &Harness, latitude: f64, longitude: f64, speed: Option<f64>) {
    let before = h.controller.location().fixes_received();
    assert!(
        h.position
            .push(PositionUpdate {
                latitude,
                longitude,
                speed,
                altitude: Some(10.0),
            })
            .await
    );
    wait_for_fixes(h, before + 1).await;
}

fn read_export(report: &ExportReport) -> Vec<AnnotatedSample> {
    let data = std::fs::read(&report.location).unwrap();
    CsvExporter::parse(&data).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_label_change_applies_to_next_tick() {
    let h = harness().await;
    h.controller.start().await.unwrap();

    for i in 0..3 {
        tick(&h, i as f64).await;
    }
    h.controller.set_label(Maneuver::Braking);
    tick(&h, 3.0).await;

    let report = h.controller.stop().await.unwrap();
    assert_eq!(report.sample_count, 4);

    let samples = h.controller.buffer().snapshot().await;
    let labels: Vec<Maneuver> = samples.iter().map(|s| s.label).collect();
    assert_eq!(
        labels,
        vec![
            Maneuver::Cruising,
            Maneuver::Cruising,
            Maneuver::Cruising,
            Maneuver::Braking
        ]
    );
    let xs: Vec<f64> = samples.iter().map(|s| s.accel.x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0]);
    assert_eq!(read_export(&report), samples);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interleaved_labels_last_write_wins() {
    let h = harness().await;
    h.controller.start().await.unwrap();

    // deterministic pseudo-random interleaving
    let mut seed = 0x2545_f491u64;
    let mut expected = Vec::new();
    let mut current = Maneuver::Cruising;
    for _ in 0..60 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let roll = (seed >> 33) as usize;
        if roll % 3 == 0 {
            // several writes between ticks collapse to the last one
            for k in 0..(roll % 4 + 1) {
                current = Maneuver::ALL[(roll + k) % Maneuver::ALL.len()];
                h.controller.set_label(current);
            }
        } else {
            tick(&h, expected.len() as f64).await;
            expected.push(current);
        }
    }

    h.controller.stop().await.unwrap();
    let labels: Vec<Maneuver> = h
        .controller
        .buffer()
        .snapshot()
        .await
        .iter()
        .map(|s| s.label)
        .collect();
    assert_eq!(labels, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_samples_carry_latest_fix_before_tick() {
    let h = harness().await;
    h.controller.enable_location().await.unwrap();
    h.controller.start().await.unwrap();

    tick(&h, 0.0).await;
    gps(&h, 37.7749, -122.4194, Some(12.5)).await;
    tick(&h, 1.0).await;
    tick(&h, 2.0).await;
    gps(&h, 37.7750, -122.4195, None).await;
    tick(&h, 3.0).await;

    let report = h.controller.stop().await.unwrap();
    let samples = h.controller.buffer().snapshot().await;

    // nothing received yet: zero sentinel
    assert_eq!((samples[0].gps_lat, samples[0].gps_lon), (0.0, 0.0));
    assert_eq!(samples[0].gps_speed, None);

    for sample in &samples[1..3] {
        assert_eq!((sample.gps_lat, sample.gps_lon), (37.7749, -122.4194));
        assert_eq!(sample.gps_speed, Some(12.5));
    }

    assert_eq!((samples[3].gps_lat, samples[3].gps_lon), (37.7750, -122.4195));
    assert_eq!(samples[3].gps_speed, None);

    let text = std::fs::read_to_string(&report.location).unwrap();
    let last_row = text.lines().last().unwrap();
    assert!(last_row.ends_with(",,37.775,-122.4195"), "{}", last_row);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_buffer_length_and_timestamp_order() {
    let h = harness().await;
    h.controller.start().await.unwrap();

    for i in 0..25 {
        tick(&h, i as f64).await;
    }
    let report = h.controller.stop().await.unwrap();
    assert_eq!(report.sample_count, 25);

    let samples = h.controller.buffer().snapshot().await;
    assert_eq!(samples.len(), 25);
    for pair in samples.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_session_exports_header_only() {
    let h = harness().await;
    h.controller.start().await.unwrap();
    let report = h.controller.stop().await.unwrap();

    assert_eq!(report.sample_count, 0);
    assert!(report.file_name.starts_with("trip_"));
    assert!(report.file_name.ends_with(".csv"));
    let text = std::fs::read_to_string(&report.location).unwrap();
    assert_eq!(
        text,
        "timestamp,label,phone_position,acc_x,acc_y,acc_z,gps_speed,latitude,longitude\n"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_transitions() {
    let h = harness().await;

    assert!(matches!(
        h.controller.stop().await,
        Err(RecorderError::NotRecording)
    ));

    h.controller.start().await.unwrap();
    assert!(matches!(
        h.controller.start().await,
        Err(RecorderError::AlreadyRecording)
    ));
    assert!(h.controller.is_recording().await);

    h.controller.stop().await.unwrap();
    assert!(!h.controller.is_recording().await);
    assert!(h.controller.buffer().is_frozen());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_appends_after_stop() {
    let h = harness().await;
    h.controller.start().await.unwrap();
    tick(&h, 0.0).await;
    h.controller.stop().await.unwrap();

    assert!(!h.motion.push(AccelReading::new(9.0, 9.0, 9.0)).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.controller.buffer().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_next_session_starts_empty_and_cruising() {
    let h = harness().await;
    h.controller.start().await.unwrap();
    h.controller.set_label(Maneuver::Pullover);
    tick(&h, 0.0).await;
    tick(&h, 1.0).await;
    let first = h.controller.stop().await.unwrap();

    h.controller.start().await.unwrap();
    assert_eq!(h.controller.buffer().len(), 0);
    assert_eq!(h.controller.label(), Maneuver::Cruising);
    tick(&h, 2.0).await;
    let second = h.controller.stop().await.unwrap();

    assert_ne!(first.session_id, second.session_id);
    assert_eq!(read_export(&first).len(), 2);
    let samples = read_export(&second);
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].label, Maneuver::Cruising);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_phone_position_locked_while_recording() {
    let h = harness().await;
    h.controller
        .set_phone_position(PhonePosition::BagOrPocket)
        .await
        .unwrap();
    h.controller.start().await.unwrap();

    assert!(matches!(
        h.controller.set_phone_position(PhonePosition::Mount).await,
        Err(RecorderError::PositionLocked)
    ));
    tick(&h, 0.0).await;
    h.controller.stop().await.unwrap();

    let samples = h.controller.buffer().snapshot().await;
    assert_eq!(samples[0].phone_position, PhonePosition::BagOrPocket);
    assert!(h
        .controller
        .set_phone_position(PhonePosition::Mount)
        .await
        .is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sensor_unavailable_keeps_idle() {
    let h = harness_with(
        ChannelMotionSource::unavailable("no accelerometer"),
        PermissionStatus::Granted,
        RecorderConfig::default(),
    )
    .await;

    assert!(matches!(
        h.controller.start().await,
        Err(RecorderError::SensorUnavailable(_))
    ));
    assert!(!h.controller.is_recording().await);
    assert!(matches!(
        h.controller.stop().await,
        Err(RecorderError::NotRecording)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_permission_denied_records_with_sentinel() {
    let h = harness_with(
        ChannelMotionSource::new(),
        PermissionStatus::Denied,
        RecorderConfig::default(),
    )
    .await;

    assert!(matches!(
        h.controller.enable_location().await,
        Err(RecorderError::PermissionDenied)
    ));
    assert!(!h.position.is_subscribed());

    h.controller.start().await.unwrap();
    tick(&h, 0.0).await;
    let status = h.controller.status().await;
    assert_eq!(status.gps_status, "Permission denied");
    assert_eq!(status.status, SessionStatus::Recording);
    h.controller.stop().await.unwrap();

    let sample = h.controller.buffer().snapshot().await[0];
    assert_eq!((sample.gps_lat, sample.gps_lon, sample.gps_speed), (0.0, 0.0, None));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sink_failure_keeps_export_for_retry() {
    let h = harness().await;
    h.sink.available.store(false, Ordering::SeqCst);

    h.controller.start().await.unwrap();
    tick(&h, 0.0).await;
    tick(&h, 1.0).await;

    let result = h.controller.stop().await;
    assert!(matches!(result, Err(RecorderError::SinkUnavailable(_))));
    assert!(!h.controller.is_recording().await);

    let status = h.controller.status().await;
    assert!(status.pending_export.is_some());
    assert_eq!(status.sample_count, 2);

    h.sink.available.store(true, Ordering::SeqCst);
    let report = h.controller.retry_export().await.unwrap();
    assert_eq!(report.sample_count, 2);
    assert_eq!(read_export(&report).len(), 2);

    assert!(matches!(
        h.controller.retry_export().await,
        Err(RecorderError::NothingToExport)
    ));
    assert!(h.controller.status().await.pending_export.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_metadata_sidecar_written() {
    let h = harness().await;
    h.controller.start().await.unwrap();
    tick(&h, 0.0).await;
    h.controller.set_label(Maneuver::LaneLeft);
    tick(&h, 1.0).await;
    tick(&h, 2.0).await;
    let report = h.controller.stop().await.unwrap();

    let meta_path = report.location.with_extension("meta.json");
    let meta: HashMap<String, String> =
        serde_json::from_str(&std::fs::read_to_string(meta_path).unwrap()).unwrap();
    assert_eq!(meta["session_id"], report.session_id);
    assert_eq!(meta["sample_count"], "3");
    assert_eq!(meta["label_count.Cruising"], "1");
    assert_eq!(meta["label_count.Lane Left"], "2");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_progress_notifications() {
    let mut config = RecorderConfig::default();
    config.recorder.notify_every = 2;
    let h = harness_with(ChannelMotionSource::new(), PermissionStatus::Granted, config).await;
    let progress = h.controller.progress();

    h.controller.start().await.unwrap();
    for i in 0..5 {
        tick(&h, i as f64).await;
    }
    h.controller.stop().await.unwrap();
    // only every second sample is announced
    assert_eq!(*progress.borrow(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_exports_active_session() {
    let h = harness().await;
    h.controller.enable_location().await.unwrap();
    h.controller.start().await.unwrap();
    tick(&h, 0.0).await;

    let report = h.controller.shutdown().await.unwrap();
    assert_eq!(report.map(|r| r.sample_count), Some(1));
    assert!(!h.controller.is_recording().await);
    assert_eq!(
        h.controller.location().status().await,
        FeedStatus::Inactive
    );
    assert!(h.controller.shutdown().await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_keeps_every_accepted_tick() {
    let h = harness().await;
    h.controller.start().await.unwrap();

    // no waiting: the ticks may still be queued when stop arrives
    for i in 0..40 {
        assert!(h.motion.push(AccelReading::new(i as f64, 0.0, 9.81)).await);
    }
    let report = h.controller.stop().await.unwrap();

    assert_eq!(report.sample_count, 40);
    let xs: Vec<f64> = read_export(&report).iter().map(|s| s.accel.x).collect();
    assert_eq!(xs, (0..40).map(|i| i as f64).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_stop_keeps_queued_ticks_on_current_thread() {
    let h = harness().await;
    h.controller.start().await.unwrap();

    for _ in 0..5 {
        assert!(h.motion.push(AccelReading::new(0.0, 0.0, 9.81)).await);
    }
    let report = h.controller.stop().await.unwrap();
    assert_eq!(report.sample_count, 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_label_change_leaves_queued_ticks_alone() {
    let h = harness().await;
    h.controller.start().await.unwrap();

    for _ in 0..3 {
        assert!(h.motion.push(AccelReading::new(0.0, 0.0, 9.81)).await);
    }
    h.controller.set_label(Maneuver::Braking);
    for _ in 0..2 {
        assert!(h.motion.push(AccelReading::new(0.0, 0.0, 9.81)).await);
    }
    h.controller.stop().await.unwrap();

    let labels: Vec<Maneuver> = h
        .controller
        .buffer()
        .snapshot()
        .await
        .iter()
        .map(|s| s.label)
        .collect();
    assert_eq!(
        labels,
        vec![
            Maneuver::Cruising,
            Maneuver::Cruising,
            Maneuver::Cruising,
            Maneuver::Braking,
            Maneuver::Braking
        ]
    );
}

#[tokio::test]
async fn test_sessions_stopped_in_same_millisecond_keep_both_files() {
    let h = harness_with_clock(
        ChannelMotionSource::new(),
        PermissionStatus::Granted,
        RecorderConfig::default(),
        Arc::new(FixedClock(1_700_000_000_000)),
    )
    .await;

    h.controller.start().await.unwrap();
    assert!(h.motion.push(AccelReading::new(1.0, 0.0, 9.81)).await);
    let first = h.controller.stop().await.unwrap();

    h.controller.start().await.unwrap();
    let second = h.controller.stop().await.unwrap();

    assert_eq!(first.file_name, "trip_1700000000000.csv");
    assert_eq!(second.file_name, "trip_1700000000000_1.csv");
    assert_ne!(first.location, second.location);
    assert_eq!(read_export(&first).len(), 1);
    assert_eq!(read_export(&second).len(), 0);
}
