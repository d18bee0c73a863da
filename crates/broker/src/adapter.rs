// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broker adapter traits.
//!
//! The engine is generic over these: production wires the Redis
//! implementations, tests wire [`crate::memory::MemoryBroker`].

use async_trait::async_trait;
use thiserror::Error;
use wq_core::{
    AnalysisRun, AnalysisScope, HolderProfilesResult, JobId, JobKind, JobRecord, JobState,
    ProgressValue, QueueName,
};

/// Errors from broker operations.
///
/// `Transport` is an infrastructure fault: callers must treat it as
/// retryable and never count it against a job's attempt budget.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker transport error: {0}")]
    Transport(String),
    #[error("corrupt job record {id}: {reason}")]
    Corrupt { id: String, reason: String },
    #[error("{op} is not supported for state {state}")]
    Unsupported { op: &'static str, state: JobState },
}

impl From<redis::RedisError> for BrokerError {
    fn from(e: redis::RedisError) -> Self {
        BrokerError::Transport(e.to_string())
    }
}

/// Spec for a new enqueue.
#[derive(Debug, Clone)]
pub struct EnqueueSpec {
    pub id: JobId,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub priority: u8,
    pub delay_ms: u64,
    pub max_attempts: u32,
}

impl EnqueueSpec {
    /// Spec with the kind's default routing and the queue's retry budget.
    pub fn new(id: JobId, kind: JobKind, payload: serde_json::Value) -> Self {
        Self {
            id,
            kind,
            payload,
            priority: kind.default_priority().value(),
            delay_ms: 0,
            max_attempts: kind.queue().settings().attempts,
        }
    }

    wq_core::setters! {
        set {
            priority: u8,
            delay_ms: u64,
            max_attempts: u32,
        }
    }
}

/// What an `add` call did.
#[derive(Debug, Clone)]
pub enum EnqueueOutcome {
    /// A fresh job was written.
    Enqueued(JobRecord),
    /// A job with this id already exists in a non-terminal state.
    AlreadyQueued(JobRecord),
    /// The id collided with a terminal job still within retention.
    /// Enqueueing is idempotent: the prior terminal job is returned.
    TerminalExists(JobRecord),
}

impl EnqueueOutcome {
    pub fn job(&self) -> &JobRecord {
        match self {
            EnqueueOutcome::Enqueued(job)
            | EnqueueOutcome::AlreadyQueued(job)
            | EnqueueOutcome::TerminalExists(job) => job,
        }
    }

    /// True when no new job was written.
    pub fn existed(&self) -> bool {
        !matches!(self, EnqueueOutcome::Enqueued(_))
    }
}

/// Per-queue counts for the stats surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub paused: bool,
}

/// What a cancellation request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The job was waiting or delayed (or terminal) and is gone.
    Removed,
    /// The job is active; abort was requested and the worker will
    /// surrender at its next checkpoint.
    AbortRequested,
    NotFound,
}

/// Lease refresh result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaseState {
    /// False when the lease is gone (stalled-out or job finished elsewhere).
    pub alive: bool,
    pub cancel_requested: bool,
}

/// Outcome of a handler failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Retry scheduled after the given delay.
    Retried { attempts_made: u32 },
    /// Attempt budget exhausted (or retry disallowed); the job is failed.
    /// This is the terminal transition.
    Failed { attempts_made: u32 },
    /// The job was not active anymore; nothing was done.
    Noop,
}

/// Result of a stalled-job sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StalledSweep {
    pub requeued: Vec<JobId>,
    /// Jobs that exceeded the max stall count; these are terminal
    /// transitions and the caller publishes their `failed` events.
    pub failed: Vec<JobId>,
}

/// C1: the queue manager surface, plus the worker-side reservation
/// protocol that keeps leases and terminal transitions atomic.
#[async_trait]
pub trait QueueAdapter: Clone + Send + Sync + 'static {
    /// Idempotent enqueue: an existing non-terminal job with the same id
    /// is returned instead of creating a duplicate.
    async fn add(&self, spec: EnqueueSpec) -> Result<EnqueueOutcome, BrokerError>;

    async fn get_job(&self, id: &JobId) -> Result<Option<JobRecord>, BrokerError>;

    /// Page through jobs in a given state, in dispatch/finish order.
    async fn jobs_in_state(
        &self,
        queue: QueueName,
        state: JobState,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<JobRecord>, BrokerError>;

    async fn counts(&self, queue: QueueName) -> Result<QueueCounts, BrokerError>;

    async fn is_paused(&self, queue: QueueName) -> Result<bool, BrokerError>;

    async fn set_paused(&self, queue: QueueName, paused: bool) -> Result<(), BrokerError>;

    /// Remove terminal jobs older than `grace_ms`, keeping the newest
    /// `keep`. Returns the number removed.
    async fn clean(
        &self,
        queue: QueueName,
        grace_ms: u64,
        keep: usize,
        state: JobState,
    ) -> Result<u64, BrokerError>;

    /// Cancel a job: waiting/delayed jobs are removed outright, active
    /// jobs get an abort request.
    async fn remove(&self, id: &JobId) -> Result<RemoveOutcome, BrokerError>;

    /// Atomically reserve the next dispatchable job: promotes due delayed
    /// jobs, pops by (priority desc, FIFO), marks it active under a lease.
    /// Reservation consumes an attempt.
    async fn reserve(
        &self,
        queue: QueueName,
        lease_ms: u64,
    ) -> Result<Option<JobRecord>, BrokerError>;

    /// Refresh an active job's lease and observe cancellation.
    async fn heartbeat(&self, id: &JobId, lease_ms: u64) -> Result<LeaseState, BrokerError>;

    /// Terminal success. Returns true iff this call performed the
    /// transition (exactly-once guard for the `completed` event).
    async fn complete(
        &self,
        id: &JobId,
        return_value: serde_json::Value,
    ) -> Result<bool, BrokerError>;

    /// Report a handler failure. With `retry_delay_ms = Some(d)` and
    /// attempts remaining, schedules a delayed retry; otherwise fails the
    /// job terminally.
    async fn fail(
        &self,
        id: &JobId,
        reason: &str,
        retry_delay_ms: Option<u64>,
    ) -> Result<FailOutcome, BrokerError>;

    /// Write a progress snapshot. Returns the cancel-requested flag so
    /// progress checkpoints double as cancellation observation points.
    async fn update_progress(
        &self,
        id: &JobId,
        progress: &ProgressValue,
    ) -> Result<bool, BrokerError>;

    /// Requeue jobs whose lease expired; jobs stalled more than
    /// `max_stalled` times are failed instead.
    async fn requeue_stalled(
        &self,
        queue: QueueName,
        max_stalled: u32,
    ) -> Result<StalledSweep, BrokerError>;
}

/// C4: distributed single-flight locks.
///
/// Every operation is a single broker round trip; release and extend are
/// owner-checked CAS so a lease handed off by TTL expiry can never be
/// clobbered by the previous owner.
#[async_trait]
pub trait LockAdapter: Clone + Send + Sync + 'static {
    /// Set-if-absent with expiry. True iff this call took the lock.
    async fn acquire(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool, BrokerError>;

    /// Delete iff the current owner matches.
    async fn release(&self, key: &str, owner: &str) -> Result<bool, BrokerError>;

    /// Re-arm the TTL iff the current owner matches.
    async fn extend(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool, BrokerError>;

    /// Existence check, optionally owner-matched.
    async fn check(&self, key: &str, owner: Option<&str>) -> Result<bool, BrokerError>;

    /// Current owner, if held.
    async fn owner(&self, key: &str) -> Result<Option<String>, BrokerError>;

    /// Remaining TTL in milliseconds, if held.
    async fn ttl_ms(&self, key: &str) -> Result<Option<u64>, BrokerError>;

    /// Unconditional delete. Reserved for emergency tooling and the
    /// orphan sweep.
    async fn force_release(&self, key: &str) -> Result<bool, BrokerError>;

    /// Non-blocking cursor scan over lock keys. Returns (key, owner) pairs.
    async fn scan_locks(&self, pattern: &str) -> Result<Vec<(String, String)>, BrokerError>;
}

/// C6: the holder-profiles result cache.
///
/// Writes degrade gracefully: a failed cache write is logged and
/// swallowed, never failing the enclosing job.
#[async_trait]
pub trait ProfilesCache: Clone + Send + Sync + 'static {
    async fn get_token(
        &self,
        mint: &str,
        top_n: u32,
    ) -> Result<Option<HolderProfilesResult>, BrokerError>;

    async fn get_wallet(&self, addr: &str)
        -> Result<Option<HolderProfilesResult>, BrokerError>;

    async fn cache_token(
        &self,
        mint: &str,
        top_n: u32,
        result: &HolderProfilesResult,
    ) -> Result<(), BrokerError>;

    async fn cache_wallet(
        &self,
        addr: &str,
        result: &HolderProfilesResult,
    ) -> Result<(), BrokerError>;

    /// Atomically drop every token-scope entry whose profiles contain
    /// `addr` (plus the wallet-scope entry). Returns keys removed.
    async fn invalidate_for_wallet(&self, addr: &str) -> Result<u64, BrokerError>;

    /// Drop all cached results for a mint. Returns keys removed.
    async fn invalidate_for_token(&self, mint: &str) -> Result<u64, BrokerError>;
}

/// Store of completed dashboard-analysis runs, read by the freshness gate
/// and written by dashboard workers.
#[async_trait]
pub trait RunStore: Clone + Send + Sync + 'static {
    async fn latest_completed(
        &self,
        wallet: &str,
        scope: AnalysisScope,
    ) -> Result<Option<AnalysisRun>, BrokerError>;

    async fn record_run(&self, run: &AnalysisRun) -> Result<(), BrokerError>;
}
