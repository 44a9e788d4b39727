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

// Externally fed sources.
//
// The platform layer (or a test) pushes readings in; the recorder consumes
// them through the usual subscription API. Every `subscribe` replaces the
// previous stream, so one source serves many sessions.

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use super::{
    AccelReading, MotionSource, PermissionStatus, PositionFilter, PositionSource, PositionUpdate,
};
use crate::error::{RecorderError, Result};
use crate::sampler::TickSender;

/// Current subscriber, if any
struct Slot<S> {
    sender: Mutex<Option<S>>,
}

impl<S: Clone> Slot<S> {
    fn new() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    fn replace(&self, sender: S) {
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    fn current(&self) -> Option<S> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Accelerometer fed through `push`
pub struct ChannelMotionSource {
    slot: Slot<TickSender>,
    unavailable: Option<String>,
}

impl ChannelMotionSource {
    pub fn new() -> Self {
        Self {
            slot: Slot::new(),
            unavailable: None,
        }
    }

    /// Source whose every subscription fails, e.g. a device without an
    /// accelerometer
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            slot: Slot::new(),
            unavailable: Some(reason.into()),
        }
    }

    /// Deliver one tick to the active subscriber. The tick is annotated
    /// before this returns.
    /// Returns `false` when nobody is subscribed.
    pub async fn push(&self, reading: AccelReading) -> bool {
        match self.slot.current() {
            Some(ticks) => ticks.send(reading).await,
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot
            .current()
            .is_some_and(|ticks| !ticks.is_closed())
    }
}

impl Default for ChannelMotionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionSource for ChannelMotionSource {
    async fn subscribe(&self, _interval: Duration, ticks: TickSender) -> Result<()> {
        if let Some(reason) = &self.unavailable {
            return Err(RecorderError::SensorUnavailable(reason.clone()));
        }
        self.slot.replace(ticks);
        Ok(())
    }

    fn source_type(&self) -> &str {
        "channel"
    }
}

/// Position source fed through `push`
pub struct ChannelPositionSource {
    slot: Slot<mpsc::Sender<PositionUpdate>>,
    permission: PermissionStatus,
}

impl ChannelPositionSource {
    pub fn new(permission: PermissionStatus) -> Self {
        Self {
            slot: Slot::new(),
            permission,
        }
    }

    pub async fn push(&self, update: PositionUpdate) -> bool {
        match self.slot.current() {
            Some(tx) => tx.send(update).await.is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.slot.current().is_some_and(|tx| !tx.is_closed())
    }
}

#[async_trait]
impl PositionSource for ChannelPositionSource {
    async fn request_foreground_permission(&self) -> PermissionStatus {
        self.permission
    }

    async fn watch_position(&self, _filter: PositionFilter) -> Result<mpsc::Receiver<PositionUpdate>> {
        if self.permission == PermissionStatus::Denied {
            return Err(RecorderError::PermissionDenied);
        }
        let (tx, rx) = mpsc::channel(64);
        self.slot.replace(tx);
        Ok(rx)
    }

    fn source_type(&self) -> &str {
        "channel"
    }
}
