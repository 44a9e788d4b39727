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

// Sampler: merges every accelerometer tick with the live label and the
// latest GPS fix into one annotated sample

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::buffer::{AnnotatedSample, SampleBuffer};
use crate::error::{RecorderError, Result};
use crate::label::{LabelState, PhonePosition};
use crate::location::FixReader;
use crate::sensors::AccelReading;

/// Annotated ticks queued between a motion source and the buffer
pub const TICK_QUEUE_CAPACITY: usize = 512;

/// Wall clock used to stamp samples
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Merge state of one activation
struct Annotator {
    label: Arc<LabelState>,
    fix: FixReader,
    phone_position: PhonePosition,
    clock: Arc<dyn Clock>,
    last_timestamp: AtomicI64,
}

impl Annotator {
    fn annotate(&self, reading: AccelReading) -> AnnotatedSample {
        let label = self.label.get();
        let fix = self.fix.snapshot();
        let now = self.clock.now_millis();
        // stamps never run backwards within a session, even if the wall clock does
        let timestamp = now.max(self.last_timestamp.fetch_max(now, Ordering::AcqRel));

        AnnotatedSample {
            timestamp,
            label,
            phone_position: self.phone_position,
            accel: reading,
            gps_speed: fix.speed,
            gps_lat: fix.latitude,
            gps_lon: fix.longitude,
        }
    }
}

/// Source end of an active sampler.
///
/// A tick is annotated the moment it is accepted here: the label, fix and
/// time it carries are those current at the `send` call, however long the
/// sample then waits in the queue. A source delivers from a single task.
#[derive(Clone)]
pub struct TickSender {
    annotator: Arc<Annotator>,
    tx: mpsc::Sender<AnnotatedSample>,
}

impl TickSender {
    /// Deliver one tick. Returns `false` once the sampler is deactivated;
    /// an accepted tick always reaches the buffer.
    pub async fn send(&self, reading: AccelReading) -> bool {
        match self.tx.reserve().await {
            Ok(permit) => {
                permit.send(self.annotator.annotate(reading));
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Appends annotated samples and reports progress
struct SampleWriter {
    buffer: Arc<SampleBuffer>,
    notify_every: usize,
    progress: Option<Arc<watch::Sender<usize>>>,
}

impl SampleWriter {
    async fn store(&self, sample: AnnotatedSample) -> Result<usize> {
        let len = self.buffer.append(sample).await?;
        if len % self.notify_every == 0 {
            info!("{} samples recorded", len);
            if let Some(progress) = &self.progress {
                progress.send_replace(len);
            }
        }
        Ok(len)
    }
}

pub struct Sampler {
    label: Arc<LabelState>,
    fix: FixReader,
    buffer: Arc<SampleBuffer>,
    phone_position: PhonePosition,
    clock: Arc<dyn Clock>,
    notify_every: usize,
    progress: Option<Arc<watch::Sender<usize>>>,
}

impl Sampler {
    pub fn new(
        label: Arc<LabelState>,
        fix: FixReader,
        buffer: Arc<SampleBuffer>,
        phone_position: PhonePosition,
    ) -> Self {
        Self {
            label,
            fix,
            buffer,
            phone_position,
            clock: Arc::new(SystemClock),
            notify_every: 50,
            progress: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish the running count on `progress` every `every` samples
    pub fn with_progress(mut self, every: usize, progress: Arc<watch::Sender<usize>>) -> Self {
        self.notify_every = every.max(1);
        self.progress = Some(progress);
        self
    }

    /// Start the buffer task. Ticks go in through the returned sender.
    pub fn activate(self) -> (TickSender, SamplerHandle) {
        let (tx, mut rx) = mpsc::channel::<AnnotatedSample>(TICK_QUEUE_CAPACITY);
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let sender = TickSender {
            annotator: Arc::new(Annotator {
                label: self.label,
                fix: self.fix,
                phone_position: self.phone_position,
                clock: self.clock,
                last_timestamp: AtomicI64::new(i64::MIN),
            }),
            tx,
        };
        let writer = SampleWriter {
            buffer: self.buffer,
            notify_every: self.notify_every,
            progress: self.progress,
        };

        let task = tokio::spawn(async move {
            let mut recorded = 0usize;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => {
                        // refuse new ticks, keep every one already accepted
                        rx.close();
                        while let Some(sample) = rx.recv().await {
                            match writer.store(sample).await {
                                Ok(_) => recorded += 1,
                                Err(e) => warn!("Failed to record queued tick: {}", e),
                            }
                        }
                        break;
                    }
                    sample = rx.recv() => match sample {
                        Some(sample) => match writer.store(sample).await {
                            Ok(_) => recorded += 1,
                            Err(RecorderError::BufferFrozen) => {
                                warn!("Buffer frozen under an active sampler, dropping tick");
                                break;
                            }
                            Err(e) => warn!("Failed to record tick: {}", e),
                        },
                        None => {
                            warn!("Motion source closed after {} ticks", recorded);
                            break;
                        }
                    }
                }
            }
            debug!("Sampler finished with {} ticks", recorded);
            recorded
        });

        (
            sender,
            SamplerHandle {
                stop: stop_tx,
                task,
            },
        )
    }
}

/// Running sampler task
pub struct SamplerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<usize>,
}

impl SamplerHandle {
    /// Unsubscribe and wait for the task to exit.
    ///
    /// Ticks accepted before this call are all recorded; nothing is appended
    /// after it returns. Returns the number of ticks this activation recorded.
    pub async fn deactivate(self) -> usize {
        // the task may already be gone if its source closed
        let _ = self.stop.send(());
        match self.task.await {
            Ok(recorded) => recorded,
            Err(e) => {
                error!("Sampler task failed: {}", e);
                0
            }
        }
    }
}
