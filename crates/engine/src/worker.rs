// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-queue worker pool.
//!
//! One reservation loop per queue with semaphore-bounded concurrency,
//! plus a stalled-job checker. Each reserved job runs its handler under
//! a lease-refreshing heartbeat, a per-kind timeout, and a cancellation
//! token observed at progress checkpoints.

use crate::handlers::{HandlerError, Handlers};
use crate::progress::{ProgressReporter, ProgressSink};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wq_broker::{FailOutcome, LockAdapter, ProfilesCache, QueueAdapter, RunStore};
use wq_core::{Clock, JobId, JobKind, JobRecord, ProgressEvent, QueueName};

/// Pool-wide worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Idle wait between empty reservation attempts.
    pub poll_interval: Duration,
    /// Visibility-timeout lease; refreshed at a third of its length.
    pub lease: Duration,
    /// Per-kind timeout overrides (environment-driven).
    pub timeouts: HashMap<JobKind, Duration>,
    /// How long shutdown waits for active handlers before abandoning
    /// their leases to broker re-delivery.
    pub drain: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            lease: Duration::from_secs(30),
            timeouts: HashMap::new(),
            drain: Duration::from_secs(30),
        }
    }
}

impl WorkerOptions {
    pub fn timeout_for(&self, kind: JobKind) -> Duration {
        self.timeouts.get(&kind).copied().unwrap_or_else(|| kind.default_timeout())
    }
}

/// C3: the worker pool.
#[derive(Clone)]
pub struct WorkerPool<Q, L, R, P, S, C>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    P: ProfilesCache,
    S: ProgressSink,
    C: Clock,
{
    queues: Q,
    locks: L,
    handlers: Arc<Handlers<Q, R, P, C>>,
    sink: S,
    clock: C,
    options: Arc<WorkerOptions>,
    shutdown: CancellationToken,
}

impl<Q, L, R, P, S, C> WorkerPool<Q, L, R, P, S, C>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    P: ProfilesCache,
    S: ProgressSink,
    C: Clock,
{
    pub fn new(
        queues: Q,
        locks: L,
        handlers: Handlers<Q, R, P, C>,
        sink: S,
        clock: C,
        options: WorkerOptions,
    ) -> Self {
        Self {
            queues,
            locks,
            handlers: Arc::new(handlers),
            sink,
            clock,
            options: Arc::new(options),
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops every worker loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Start one reservation loop and one stalled checker per queue.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(QueueName::ALL.len() * 2);
        for queue in QueueName::ALL {
            handles.push(tokio::spawn(self.clone().run_queue(queue)));
            handles.push(tokio::spawn(self.clone().stalled_loop(queue)));
        }
        handles
    }

    async fn run_queue(self, queue: QueueName) {
        let settings = queue.settings();
        let semaphore = Arc::new(Semaphore::new(settings.concurrency));
        let mut tasks = JoinSet::new();
        let lease_ms = self.options.lease.as_millis() as u64;
        info!(queue = %queue, concurrency = settings.concurrency, "worker started");

        loop {
            // Reap finished handler tasks opportunistically.
            while tasks.try_join_next().is_some() {}

            let permit = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            match self.queues.reserve(queue, lease_ms).await {
                Ok(Some(job)) => {
                    let pool = self.clone();
                    tasks.spawn(async move {
                        pool.process(job).await;
                        drop(permit);
                    });
                }
                Ok(None) => {
                    drop(permit);
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.options.poll_interval) => {}
                    }
                }
                Err(e) => {
                    drop(permit);
                    warn!(queue = %queue, error = %e, "reservation failed");
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        // Drain active handlers until the deadline, then abandon their
        // leases; the broker re-delivers after lease expiry.
        let drained = tokio::time::timeout(self.options.drain, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(queue = %queue, "drain deadline reached, abandoning active leases");
            tasks.abort_all();
        }
        info!(queue = %queue, "worker stopped");
    }

    async fn stalled_loop(self, queue: QueueName) {
        let settings = queue.settings();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(settings.stalled_interval) => {}
            }
            self.check_stalled(queue, settings.max_stalled).await;
        }
    }

    /// One stalled-check pass: requeue expired leases, and own the
    /// terminal bookkeeping (lock + failed event) for jobs the sweep
    /// failed.
    async fn check_stalled(&self, queue: QueueName, max_stalled: u32) {
        match self.queues.requeue_stalled(queue, max_stalled).await {
            Ok(sweep) => {
                for id in &sweep.requeued {
                    warn!(job_id = %id, queue = %queue, "stalled job requeued");
                }
                for id in &sweep.failed {
                    if let Ok(Some(job)) = self.queues.get_job(id).await {
                        self.release_lock(&job).await;
                        self.sink.publish(ProgressEvent::failed(
                            job.id.clone(),
                            queue,
                            job.failed_reason.as_deref().unwrap_or("stalled"),
                            job.attempts_made,
                            self.clock.epoch_ms(),
                        ));
                    }
                    warn!(job_id = %id, queue = %queue, "stalled job failed");
                }
            }
            Err(e) => warn!(queue = %queue, error = %e, "stalled check failed"),
        }
    }

    /// Run one reserved job to a terminal or retry outcome.
    async fn process(&self, job: JobRecord) {
        let id = job.id.clone();
        let queue = job.queue;
        let now = self.clock.epoch_ms();

        if job.attempts_made == 1 {
            let wait = job.processed_at_ms.unwrap_or(now).saturating_sub(job.created_at_ms);
            self.sink.publish(ProgressEvent::queue_to_start(id.clone(), queue, wait, now));
        }
        self.sink.publish(ProgressEvent::active(id.clone(), queue, job.attempts_made, now));

        let cancel = CancellationToken::new();
        let heartbeat = self.spawn_heartbeat(id.clone(), cancel.clone());
        let reporter = ProgressReporter::new(
            self.queues.clone(),
            self.sink.clone(),
            self.clock.clone(),
            id.clone(),
            queue,
            cancel.clone(),
        );

        let timeout = self.effective_timeout(&job);
        let started = Instant::now();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(HandlerError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.handlers.run(&job, &reporter)) => {
                match outcome {
                    Ok(inner) => inner,
                    Err(_) => Err(HandlerError::Timeout),
                }
            }
        };
        heartbeat.abort();
        let processing_ms = started.elapsed().as_millis() as u64;

        // The single-flight lock goes before the terminal transition.
        self.release_lock(&job).await;

        match result {
            Ok(value) => match self.queues.complete(&id, value.clone()).await {
                Ok(true) => {
                    let finished = self.clock.epoch_ms();
                    let total = finished.saturating_sub(job.created_at_ms);
                    self.sink.publish(ProgressEvent::completed(
                        id.clone(),
                        queue,
                        &value,
                        processing_ms,
                        total,
                        finished,
                    ));
                    info!(job_id = %id, queue = %queue, processing_ms, "job completed");
                }
                Ok(false) => warn!(job_id = %id, "terminal transition already performed elsewhere"),
                Err(e) => warn!(job_id = %id, error = %e, "completion write failed"),
            },
            Err(HandlerError::Broker(e)) => {
                // Transport fault, not a job failure: leave the job for
                // lease expiry so the attempt is handed back.
                warn!(job_id = %id, error = %e, "broker fault during handling, leaving for re-delivery");
            }
            Err(err) => {
                let (reason, retry_delay_ms) = match err {
                    HandlerError::Recoverable(msg) => {
                        let delay = queue.settings().backoff.delay_for(job.attempts_made);
                        (msg, Some(delay.as_millis() as u64))
                    }
                    HandlerError::Permanent(msg) => (msg, None),
                    HandlerError::Timeout => ("timeout".to_string(), None),
                    HandlerError::Cancelled => ("cancelled".to_string(), None),
                    HandlerError::Broker(e) => (e.to_string(), None),
                };
                match self.queues.fail(&id, &reason, retry_delay_ms).await {
                    Ok(FailOutcome::Failed { attempts_made }) => {
                        self.sink.publish(ProgressEvent::failed(
                            id.clone(),
                            queue,
                            &reason,
                            attempts_made,
                            self.clock.epoch_ms(),
                        ));
                        warn!(job_id = %id, queue = %queue, %reason, attempts_made, "job failed");
                    }
                    Ok(FailOutcome::Retried { attempts_made }) => {
                        info!(job_id = %id, attempts_made, %reason, "retry scheduled");
                    }
                    Ok(FailOutcome::Noop) => {}
                    Err(e) => warn!(job_id = %id, error = %e, "failure write failed"),
                }
            }
        }
    }

    fn spawn_heartbeat(&self, id: JobId, cancel: CancellationToken) -> JoinHandle<()> {
        let queues = self.queues.clone();
        let interval = self.options.lease / 3;
        let lease_ms = self.options.lease.as_millis() as u64;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if cancel.is_cancelled() {
                    break;
                }
                match queues.heartbeat(&id, lease_ms).await {
                    Ok(lease) => {
                        if !lease.alive || lease.cancel_requested {
                            cancel.cancel();
                            break;
                        }
                    }
                    // A transient refresh failure is survivable while the
                    // lease has slack; the next tick retries.
                    Err(e) => warn!(job_id = %id, error = %e, "lease refresh failed"),
                }
            }
        })
    }

    fn effective_timeout(&self, job: &JobRecord) -> Duration {
        // Dashboard payloads carry a resolved per-scope timeout.
        if job.kind == JobKind::DashboardWalletAnalysis {
            if let Some(minutes) = job.payload["timeoutMinutes"].as_u64() {
                return Duration::from_secs(minutes * 60);
            }
        }
        self.options.timeout_for(job.kind)
    }

    async fn release_lock(&self, job: &JobRecord) {
        let Some(natural_key) = single_flight_key(job) else { return };
        let Some(lock_key) = job.kind.lock_key(&natural_key) else { return };
        if let Err(e) = self.locks.release(&lock_key, job.id.as_str()).await {
            warn!(job_id = %job.id, lock_key, error = %e, "lock release failed");
        }
    }
}

/// Natural key for a job's single-flight lock, read back from its payload.
fn single_flight_key(job: &JobRecord) -> Option<String> {
    match job.kind {
        JobKind::SyncWallet
        | JobKind::AnalyzePnl
        | JobKind::AnalyzeBehavior
        | JobKind::DashboardWalletAnalysis => {
            job.payload["walletAddress"].as_str().map(str::to_string)
        }
        JobKind::SimilarityAnalysisFlow => job.payload["requestId"].as_str().map(str::to_string),
        JobKind::EnrichTokenBalances | JobKind::AnalyzeHolderProfiles => None,
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
