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

// Synthetic sensor sources for demos and bench runs

use async_trait::async_trait;
use std::f64::consts::PI;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::debug;

use super::{
    distance_m, AccelReading, MotionSource, PermissionStatus, PositionFilter, PositionSource,
    PositionUpdate,
};
use crate::error::Result;
use crate::sampler::TickSender;

const STANDARD_GRAVITY: f64 = 9.81;

/// Accelerometer that emits a gentle sinusoid around gravity
#[derive(Debug, Default)]
pub struct SimulatedMotionSource;

impl SimulatedMotionSource {
    pub fn new() -> Self {
        Self
    }

    /// Reading at `t` seconds into the stream
    pub fn reading_at(t: f64) -> AccelReading {
        AccelReading {
            x: (t * 2.0 * PI).sin() * 0.5,
            y: (t * 2.0 * PI).cos() * 0.3,
            z: STANDARD_GRAVITY + (t * PI).sin() * 0.1,
        }
    }
}

#[async_trait]
impl MotionSource for SimulatedMotionSource {
    async fn subscribe(&self, period: Duration, ticks: TickSender) -> Result<()> {
        let step = period.as_secs_f64();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            let mut tick = 0u64;
            loop {
                ticker.tick().await;
                if !ticks.send(Self::reading_at(tick as f64 * step)).await {
                    debug!("Simulated accelerometer unsubscribed after {} ticks", tick);
                    break;
                }
                tick += 1;
            }
        });

        Ok(())
    }

    fn source_type(&self) -> &str {
        "simulated"
    }
}

/// GPS receiver that drives slowly north-east from a fixed origin.
///
/// The first fix of every subscription has no speed, the way a receiver
/// reports a cold start.
pub struct SimulatedPositionSource {
    permission: PermissionStatus,
    origin: (f64, f64),
}

impl SimulatedPositionSource {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            permission,
            origin: (37.7749, -122.4194),
        }
    }

    fn update_at(origin: (f64, f64), seq: u64) -> PositionUpdate {
        let s = seq as f64;
        PositionUpdate {
            latitude: origin.0 + s * 0.0001,
            longitude: origin.1 + s * 0.0001,
            speed: (seq > 0).then(|| 10.0 + (s * 0.5).sin() * 5.0),
            altitude: Some(15.0 + (s * 0.1).sin()),
        }
    }
}

#[async_trait]
impl PositionSource for SimulatedPositionSource {
    async fn request_foreground_permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn watch_position(&self, filter: PositionFilter) -> Result<mpsc::Receiver<PositionUpdate>> {
        let (tx, rx) = mpsc::channel(100);
        let origin = self.origin;

        tokio::spawn(async move {
            let mut ticker = interval(filter.min_time);
            let mut last_sent: Option<PositionUpdate> = None;
            let mut seq = 0u64;
            loop {
                ticker.tick().await;
                let update = Self::update_at(origin, seq);
                seq += 1;

                let moved_enough = last_sent.map_or(true, |prev| {
                    distance_m(prev.latitude, prev.longitude, update.latitude, update.longitude)
                        >= filter.min_distance_m
                });
                if !moved_enough {
                    continue;
                }

                if tx.send(update).await.is_err() {
                    debug!("Simulated position source unsubscribed after {} fixes", seq);
                    break;
                }
                last_sent = Some(update);
            }
        });

        Ok(rx)
    }

    fn source_type(&self) -> &str {
        "simulated"
    }
}
