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
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{RecorderError, Result};
use crate::label::{Maneuver, PhonePosition};
use crate::sensors::AccelReading;

/// One accelerometer tick tagged with the label and GPS context active at
/// that instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedSample {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub label: Maneuver,
    pub phone_position: PhonePosition,
    pub accel: AccelReading,
    pub gps_speed: Option<f64>,
    pub gps_lat: f64,
    pub gps_lon: f64,
}

/// Append-only sample store for the active session.
///
/// The buffer starts frozen. `reset` clears it and opens it for appends,
/// `freeze` closes it again; once frozen, the contents only change on the
/// next `reset`.
pub struct SampleBuffer {
    samples: RwLock<Vec<AnnotatedSample>>,
    frozen: AtomicBool,
    total_samples: AtomicUsize,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self {
            samples: RwLock::new(Vec::new()),
            frozen: AtomicBool::new(true),
            total_samples: AtomicUsize::new(0),
        }
    }

    /// Discard every sample and accept appends again
    pub async fn reset(&self) {
        let mut samples = self.samples.write().await;
        let discarded = samples.len();
        *samples = Vec::new();
        self.total_samples.store(0, Ordering::Relaxed);
        self.frozen.store(false, Ordering::Release);
        debug!("Sample buffer reset, discarded {} samples", discarded);
    }

    /// Add a sample at the end, returning the new length
    pub async fn append(&self, sample: AnnotatedSample) -> Result<usize> {
        let mut samples = self.samples.write().await;
        // checked under the write lock so an append cannot land after a freeze
        if self.frozen.load(Ordering::Acquire) {
            return Err(RecorderError::BufferFrozen);
        }
        samples.push(sample);
        let len = samples.len();
        self.total_samples.store(len, Ordering::Relaxed);
        Ok(len)
    }

    /// Stop accepting appends
    pub async fn freeze(&self) {
        let _guard = self.samples.write().await;
        self.frozen.store(true, Ordering::Release);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Full ordered copy of the buffer
    pub async fn snapshot(&self) -> Vec<AnnotatedSample> {
        self.samples.read().await.clone()
    }

    pub fn len(&self) -> usize {
        self.total_samples.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64) -> AnnotatedSample {
        AnnotatedSample {
            timestamp,
            label: Maneuver::Cruising,
            phone_position: PhonePosition::Mount,
            accel: AccelReading::new(0.0, 0.0, 9.81),
            gps_speed: None,
            gps_lat: 0.0,
            gps_lon: 0.0,
        }
    }

    #[tokio::test]
    async fn test_new_buffer_rejects_appends() {
        let buffer = SampleBuffer::new();
        assert!(buffer.is_frozen());
        assert!(matches!(
            buffer.append(sample(1)).await,
            Err(RecorderError::BufferFrozen)
        ));
    }

    #[tokio::test]
    async fn test_append_keeps_insertion_order() {
        let buffer = SampleBuffer::new();
        buffer.reset().await;
        for ts in 1..=5 {
            assert_eq!(buffer.append(sample(ts)).await.unwrap(), ts as usize);
        }

        let snapshot = buffer.snapshot().await;
        let timestamps: Vec<i64> = snapshot.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1, 2, 3, 4, 5]);
        assert_eq!(buffer.len(), 5);
    }

    #[tokio::test]
    async fn test_freeze_then_reset() {
        let buffer = SampleBuffer::new();
        buffer.reset().await;
        buffer.append(sample(1)).await.unwrap();
        buffer.freeze().await;

        assert!(buffer.append(sample(2)).await.is_err());
        assert_eq!(buffer.snapshot().await.len(), 1);

        buffer.reset().await;
        assert!(buffer.is_empty());
        assert!(buffer.snapshot().await.is_empty());
        assert!(buffer.append(sample(3)).await.is_ok());
    }
}
