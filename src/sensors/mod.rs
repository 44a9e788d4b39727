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

// Sensor collaborator module
//
// The recorder never talks to hardware directly. It subscribes to a
// `MotionSource` for fixed-rate accelerometer ticks, delivered straight
// into the sampler, and to a `PositionSource` for slower GPS fixes over a
// tokio mpsc channel. Implementations:
// - simulated: synthetic signals for demos and bench runs
// - channel: externally fed sources for embedding and tests

pub mod channel;
pub mod simulated;

pub use channel::{ChannelMotionSource, ChannelPositionSource};
pub use simulated::{SimulatedMotionSource, SimulatedPositionSource};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::sampler::TickSender;

/// Instantaneous accelerometer vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelReading {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One position update as delivered by the platform.
/// `speed` and `altitude` are `None` when the receiver did not report them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: Option<f64>,
    pub altitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LocationAccuracy {
    #[default]
    BestForNavigation,
    High,
    Balanced,
    Low,
}

/// Delivery filter requested from the position source
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFilter {
    pub accuracy: LocationAccuracy,
    pub min_time: Duration,
    pub min_distance_m: f64,
}

impl Default for PositionFilter {
    fn default() -> Self {
        Self {
            accuracy: LocationAccuracy::BestForNavigation,
            min_time: Duration::from_millis(1000),
            min_distance_m: 1.0,
        }
    }
}

/// Fixed-rate accelerometer source.
///
/// Each `subscribe` call starts a fresh stream into `ticks`; the stream ends
/// once `ticks` reports closed.
#[async_trait]
pub trait MotionSource: Send + Sync {
    async fn subscribe(&self, interval: Duration, ticks: TickSender) -> Result<()>;

    fn source_type(&self) -> &str;
}

/// Continuous position source gated by a foreground permission
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn request_foreground_permission(&self) -> PermissionStatus;

    async fn watch_position(&self, filter: PositionFilter)
        -> Result<mpsc::Receiver<PositionUpdate>>;

    fn source_type(&self) -> &str;
}

/// Ground distance between two fixes in meters (equirectangular approximation,
/// accurate enough for the meter-scale delivery filter).
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let x = (lon2 - lon1).to_radians() * ((phi1 + phi2) / 2.0).cos();
    let y = phi2 - phi1;
    (x * x + y * y).sqrt() * EARTH_RADIUS_M
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_one_millidegree_latitude() {
        let d = distance_m(37.0, -122.0, 37.001, -122.0);
        assert!((d - 111.19).abs() < 0.5, "got {}", d);
    }

    #[test]
    fn test_default_filter_matches_navigation_profile() {
        let filter = PositionFilter::default();
        assert_eq!(filter.accuracy, LocationAccuracy::BestForNavigation);
        assert_eq!(filter.min_time, Duration::from_secs(1));
        assert_eq!(filter.min_distance_m, 1.0);
    }
}
