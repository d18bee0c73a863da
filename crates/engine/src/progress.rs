// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress bus publish side.
//!
//! [`ProgressSink`] is the seam between the worker pool and the realtime
//! channel: workers publish through it, the gateway subscribes to
//! [`ProgressBus`] and fans events out per job id. Owning the trait here
//! keeps the gateway from importing the worker layer (and vice versa).

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use wq_broker::QueueAdapter;
use wq_core::{Clock, JobId, ProgressEvent, ProgressValue, QueueName};

/// Where workers publish progress events.
pub trait ProgressSink: Clone + Send + Sync + 'static {
    fn publish(&self, event: ProgressEvent);
}

/// The process-wide topic. Fan-out is best-effort: slow subscribers lose
/// oldest events rather than backpressuring workers.
#[derive(Clone)]
pub struct ProgressBus {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl ProgressSink for ProgressBus {
    fn publish(&self, event: ProgressEvent) {
        // No subscribers is fine; events are observability, not state.
        let _ = self.tx.send(event);
    }
}

/// Sink that drops everything (workers without a realtime channel).
#[derive(Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _event: ProgressEvent) {}
}

/// Sink that collects events for assertions.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct CollectingSink {
    events: std::sync::Arc<Mutex<Vec<ProgressEvent>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn events_for(&self, job_id: &JobId) -> Vec<ProgressEvent> {
        self.events.lock().iter().filter(|e| &e.job_id == job_id).cloned().collect()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ProgressSink for CollectingSink {
    fn publish(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

/// Cancellation observed at a progress checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cancellation requested")]
pub struct Aborted;

/// Object-safe progress reporting surface handed to handlers and
/// analyzers. Reporting doubles as the cancellation observation point.
#[async_trait]
pub trait ProgressProbe: Send + Sync {
    /// Report progress. `Err(Aborted)` means the job was cancelled and
    /// the computation must surrender with no result.
    async fn report(&self, value: ProgressValue) -> Result<(), Aborted>;
}

/// The worker-owned typed reporter: writes the broker snapshot, publishes
/// the bus event, enforces non-decreasing percentages, and surfaces
/// cancellation.
pub struct ProgressReporter<Q: QueueAdapter, S: ProgressSink, C: Clock> {
    queues: Q,
    sink: S,
    clock: C,
    job_id: JobId,
    queue: QueueName,
    cancel: CancellationToken,
    last_percent: Mutex<u8>,
}

impl<Q: QueueAdapter, S: ProgressSink, C: Clock> ProgressReporter<Q, S, C> {
    pub fn new(
        queues: Q,
        sink: S,
        clock: C,
        job_id: JobId,
        queue: QueueName,
        cancel: CancellationToken,
    ) -> Self {
        Self { queues, sink, clock, job_id, queue, cancel, last_percent: Mutex::new(0) }
    }

    /// Convenience percent report.
    pub async fn percent(&self, pct: u8) -> Result<(), Aborted> {
        self.report(ProgressValue::from(pct)).await
    }

    /// Convenience structured stage report.
    pub async fn stage(&self, stage: &str, message: &str) -> Result<(), Aborted> {
        self.report(ProgressValue::Structured(serde_json::json!({
            "stage": stage,
            "message": message,
        })))
        .await
    }

    fn clamp_monotonic(&self, value: ProgressValue) -> ProgressValue {
        match value {
            ProgressValue::Percent(pct) => {
                let mut last = self.last_percent.lock();
                let pct = pct.max(*last);
                *last = pct;
                ProgressValue::Percent(pct)
            }
            structured => structured,
        }
    }
}

#[async_trait]
impl<Q: QueueAdapter, S: ProgressSink, C: Clock> ProgressProbe for ProgressReporter<Q, S, C> {
    async fn report(&self, value: ProgressValue) -> Result<(), Aborted> {
        if self.cancel.is_cancelled() {
            return Err(Aborted);
        }
        let value = self.clamp_monotonic(value);
        match self.queues.update_progress(&self.job_id, &value).await {
            Ok(true) => {
                self.cancel.cancel();
                return Err(Aborted);
            }
            Ok(false) => {}
            Err(e) => {
                // Losing a progress snapshot is tolerable; the job goes on.
                warn!(job_id = %self.job_id, error = %e, "progress write failed");
            }
        }
        self.sink.publish(ProgressEvent::progress(
            self.job_id.clone(),
            self.queue,
            &value,
            self.clock.epoch_ms(),
        ));
        Ok(())
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
