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

// Location feed: keeps the freshest GPS fix available to the sampler

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{RecorderError, Result};
use crate::sensors::{PermissionStatus, PositionFilter, PositionSource, PositionUpdate};

/// Most recent GPS reading.
///
/// Starts as the zero sentinel (0.0/0.0, no speed, no altitude) and is
/// replaced wholesale on every update. It is never cleared, so the last fix
/// outlives the feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LatestFix {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub altitude: Option<f64>,
    /// Epoch milliseconds when the update was applied, `None` for the sentinel
    pub received_at: Option<i64>,
}

impl LatestFix {
    pub fn from_update(update: PositionUpdate, received_at: i64) -> Self {
        Self {
            latitude: update.latitude,
            longitude: update.longitude,
            speed: update.speed,
            altitude: update.altitude,
            received_at: Some(received_at),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.received_at.is_none()
    }
}

/// Read side of the feed. Each `snapshot` copies the whole fix at once.
#[derive(Debug, Clone)]
pub struct FixReader {
    rx: watch::Receiver<LatestFix>,
}

impl FixReader {
    pub fn snapshot(&self) -> LatestFix {
        *self.rx.borrow()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Inactive,
    Active,
    PermissionDenied,
}

struct Shared {
    latest: watch::Sender<LatestFix>,
    fixes_received: AtomicU64,
}

impl Shared {
    fn apply(&self, update: PositionUpdate) -> LatestFix {
        let fix = LatestFix::from_update(update, Utc::now().timestamp_millis());
        self.latest.send_replace(fix);
        self.fixes_received.fetch_add(1, Ordering::Relaxed);
        fix
    }
}

struct FeedTask {
    status: FeedStatus,
    handle: Option<JoinHandle<()>>,
}

/// Subscribes to a position source and republishes each update as the
/// latest fix
pub struct LocationFeed {
    shared: Arc<Shared>,
    filter: PositionFilter,
    task: Mutex<FeedTask>,
}

impl LocationFeed {
    pub fn new(filter: PositionFilter) -> Self {
        let (latest, _) = watch::channel(LatestFix::default());
        Self {
            shared: Arc::new(Shared {
                latest,
                fixes_received: AtomicU64::new(0),
            }),
            filter,
            task: Mutex::new(FeedTask {
                status: FeedStatus::Inactive,
                handle: None,
            }),
        }
    }

    /// Ask for permission and start consuming updates.
    ///
    /// A denial is reported through the returned error and the feed status;
    /// it is not retried. Starting an active feed is a no-op.
    pub async fn start(&self, source: Arc<dyn PositionSource>) -> Result<()> {
        let mut task = self.task.lock().await;
        if task.status == FeedStatus::Active {
            return Ok(());
        }

        if source.request_foreground_permission().await == PermissionStatus::Denied {
            warn!(
                "Location permission denied by '{}' source, recording without GPS",
                source.source_type()
            );
            task.status = FeedStatus::PermissionDenied;
            return Err(RecorderError::PermissionDenied);
        }

        let mut rx = match source.watch_position(self.filter).await {
            Ok(rx) => rx,
            Err(RecorderError::PermissionDenied) => {
                task.status = FeedStatus::PermissionDenied;
                return Err(RecorderError::PermissionDenied);
            }
            Err(e) => return Err(e),
        };

        info!(
            "Location feed started ({:?}, every {:?}, >= {} m)",
            self.filter.accuracy, self.filter.min_time, self.filter.min_distance_m
        );

        let shared = self.shared.clone();
        task.handle = Some(tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                let fix = shared.apply(update);
                debug!(
                    "GPS fix {:.6},{:.6} speed={:?}",
                    fix.latitude, fix.longitude, fix.speed
                );
            }
            debug!("Position source closed");
        }));
        task.status = FeedStatus::Active;

        Ok(())
    }

    /// End the subscription. The last fix stays readable.
    pub async fn stop(&self) {
        let mut task = self.task.lock().await;
        if let Some(handle) = task.handle.take() {
            handle.abort();
            info!("Location feed stopped");
        }
        if task.status == FeedStatus::Active {
            task.status = FeedStatus::Inactive;
        }
    }

    /// Replace the latest fix directly, bypassing the subscription
    pub fn apply(&self, update: PositionUpdate) -> LatestFix {
        self.shared.apply(update)
    }

    pub fn latest(&self) -> LatestFix {
        *self.shared.latest.borrow()
    }

    pub fn reader(&self) -> FixReader {
        FixReader {
            rx: self.shared.latest.subscribe(),
        }
    }

    pub fn fixes_received(&self) -> u64 {
        self.shared.fixes_received.load(Ordering::Relaxed)
    }

    pub async fn status(&self) -> FeedStatus {
        self.task.lock().await.status
    }
}

impl Default for LocationFeed {
    fn default() -> Self {
        Self::new(PositionFilter::default())
    }
}
