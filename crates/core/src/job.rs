// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job kinds, queues, priorities, and the broker-owned job record.

use crate::progress::ProgressValue;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Deterministic identifier for a job.
///
/// Derived from (kind, natural key, optional request id) by
/// [`crate::jobid::derive_job_id`]. Two processes dispatching the same
/// work produce the same id, which is what makes enqueueing idempotent
/// at the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    /// Create a JobId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this JobId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for JobId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for JobId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for JobId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The closed set of job kinds the dispatcher accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    SyncWallet,
    AnalyzePnl,
    AnalyzeBehavior,
    DashboardWalletAnalysis,
    SimilarityAnalysisFlow,
    EnrichTokenBalances,
    AnalyzeHolderProfiles,
}

impl JobKind {
    pub const ALL: [JobKind; 7] = [
        JobKind::SyncWallet,
        JobKind::AnalyzePnl,
        JobKind::AnalyzeBehavior,
        JobKind::DashboardWalletAnalysis,
        JobKind::SimilarityAnalysisFlow,
        JobKind::EnrichTokenBalances,
        JobKind::AnalyzeHolderProfiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::SyncWallet => "sync-wallet",
            JobKind::AnalyzePnl => "analyze-pnl",
            JobKind::AnalyzeBehavior => "analyze-behavior",
            JobKind::DashboardWalletAnalysis => "dashboard-wallet-analysis",
            JobKind::SimilarityAnalysisFlow => "similarity-analysis-flow",
            JobKind::EnrichTokenBalances => "enrich-token-balances",
            JobKind::AnalyzeHolderProfiles => "analyze-holder-profiles",
        }
    }

    /// The queue this kind is routed onto.
    pub fn queue(&self) -> QueueName {
        match self {
            JobKind::SyncWallet => QueueName::WalletOperations,
            JobKind::AnalyzePnl
            | JobKind::AnalyzeBehavior
            | JobKind::DashboardWalletAnalysis
            | JobKind::AnalyzeHolderProfiles => QueueName::AnalysisOperations,
            JobKind::SimilarityAnalysisFlow => QueueName::SimilarityOperations,
            JobKind::EnrichTokenBalances => QueueName::EnrichmentOperations,
        }
    }

    /// Default priority when the dispatcher has nothing more specific.
    ///
    /// Dashboard jobs are re-prioritized per scope before enqueue.
    pub fn default_priority(&self) -> Priority {
        match self {
            JobKind::EnrichTokenBalances => Priority::Low,
            _ => Priority::Normal,
        }
    }

    /// Single-flight lock key for a natural key, if the kind requires one.
    pub fn lock_key(&self, natural_key: &str) -> Option<String> {
        match self {
            JobKind::SyncWallet => Some(format!("lock:wallet:sync:{natural_key}")),
            JobKind::AnalyzePnl => Some(format!("lock:wallet:pnl:{natural_key}")),
            JobKind::AnalyzeBehavior => Some(format!("lock:wallet:behavior:{natural_key}")),
            JobKind::DashboardWalletAnalysis => {
                Some(format!("lock:wallet:dashboard-analysis:{natural_key}"))
            }
            JobKind::SimilarityAnalysisFlow => Some(format!("lock:similarity:{natural_key}")),
            JobKind::EnrichTokenBalances | JobKind::AnalyzeHolderProfiles => None,
        }
    }

    /// Hard handler timeout for this kind, before environment overrides.
    pub fn default_timeout(&self) -> Duration {
        match self {
            JobKind::SyncWallet => Duration::from_secs(10 * 60),
            JobKind::AnalyzePnl | JobKind::AnalyzeBehavior => Duration::from_secs(5 * 60),
            JobKind::DashboardWalletAnalysis => Duration::from_secs(15 * 60),
            JobKind::SimilarityAnalysisFlow => Duration::from_secs(30 * 60),
            JobKind::EnrichTokenBalances => Duration::from_secs(20 * 60),
            JobKind::AnalyzeHolderProfiles => Duration::from_secs(5 * 60),
        }
    }

    /// Environment variable that overrides the timeout for this kind.
    pub fn timeout_env_var(&self) -> &'static str {
        match self {
            JobKind::SyncWallet => "SYNC_WALLET_TIMEOUT_MS",
            JobKind::AnalyzePnl => "ANALYZE_PNL_TIMEOUT_MS",
            JobKind::AnalyzeBehavior => "ANALYZE_BEHAVIOR_TIMEOUT_MS",
            JobKind::DashboardWalletAnalysis => "DASHBOARD_WALLET_ANALYSIS_TIMEOUT_MS",
            JobKind::SimilarityAnalysisFlow => "CALCULATE_SIMILARITY_TIMEOUT_MS",
            JobKind::EnrichTokenBalances => "ENRICH_TOKEN_BALANCES_TIMEOUT_MS",
            JobKind::AnalyzeHolderProfiles => "ANALYZE_HOLDER_PROFILES_TIMEOUT_MS",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownName { what: "job kind", name: s.to_string() })
    }
}

/// Parse failure for closed name sets (queues, kinds, states).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what}: {name}")]
pub struct UnknownName {
    pub what: &'static str,
    pub name: String,
}

/// The four named queues backing the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    WalletOperations,
    AnalysisOperations,
    SimilarityOperations,
    EnrichmentOperations,
}

impl QueueName {
    pub const ALL: [QueueName; 4] = [
        QueueName::WalletOperations,
        QueueName::AnalysisOperations,
        QueueName::SimilarityOperations,
        QueueName::EnrichmentOperations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::WalletOperations => "wallet-operations",
            QueueName::AnalysisOperations => "analysis-operations",
            QueueName::SimilarityOperations => "similarity-operations",
            QueueName::EnrichmentOperations => "enrichment-operations",
        }
    }

    /// Static per-queue processing settings.
    pub fn settings(&self) -> QueueSettings {
        match self {
            QueueName::WalletOperations => QueueSettings {
                concurrency: 3,
                attempts: 3,
                backoff: BackoffPolicy::Exponential { base: Duration::from_secs(2) },
                remove_on_complete: 100,
                remove_on_fail: 500,
                stalled_interval: Duration::from_secs(30),
                max_stalled: 1,
            },
            QueueName::AnalysisOperations => QueueSettings {
                concurrency: 10,
                attempts: 3,
                backoff: BackoffPolicy::Exponential { base: Duration::from_secs(3) },
                remove_on_complete: 200,
                remove_on_fail: 1000,
                stalled_interval: Duration::from_secs(30),
                max_stalled: 3,
            },
            QueueName::SimilarityOperations => QueueSettings {
                concurrency: 2,
                attempts: 3,
                backoff: BackoffPolicy::Exponential { base: Duration::from_secs(3) },
                remove_on_complete: 50,
                remove_on_fail: 250,
                stalled_interval: Duration::from_secs(30),
                max_stalled: 1,
            },
            QueueName::EnrichmentOperations => QueueSettings {
                concurrency: 3,
                attempts: 3,
                backoff: BackoffPolicy::Fixed { delay: Duration::from_secs(2) },
                remove_on_complete: 100,
                remove_on_fail: 500,
                stalled_interval: Duration::from_secs(30),
                max_stalled: 1,
            },
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| UnknownName { what: "queue", name: s.to_string() })
    }
}

/// Per-queue processing settings: concurrency, retry budget, backoff,
/// retention caps, and stalled-job detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub attempts: u32,
    pub backoff: BackoffPolicy,
    /// Terminal-state retention caps (count of jobs kept per state).
    pub remove_on_complete: usize,
    pub remove_on_fail: usize,
    pub stalled_interval: Duration,
    /// Requeue a stalled job at most this many times before failing it.
    pub max_stalled: u32,
}

/// Retry backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// `delay(n) = base × 2^(n-1)`
    Exponential { base: Duration },
    Fixed { delay: Duration },
}

impl BackoffPolicy {
    /// Delay before retry attempt `n` (1-indexed: the delay applied after
    /// the n-th failed attempt).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Exponential { base } => {
                // Exponent capped so pathological attempt counts can't overflow.
                let exp = attempt.saturating_sub(1).min(16);
                *base * 2u32.pow(exp)
            }
            BackoffPolicy::Fixed { delay } => *delay,
        }
    }
}

/// Lifecycle state of a job at the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Waiting,
    Active,
    Completed,
    Failed,
    Delayed,
    /// Queue-level pause; jobs themselves stay `waiting` but are not dispatched.
    Paused,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

crate::simple_display! {
    JobState {
        Waiting => "waiting",
        Active => "active",
        Completed => "completed",
        Failed => "failed",
        Delayed => "delayed",
        Paused => "paused",
    }
}

impl FromStr for JobState {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(JobState::Waiting),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "delayed" => Ok(JobState::Delayed),
            "paused" => Ok(JobState::Paused),
            _ => Err(UnknownName { what: "job state", name: s.to_string() }),
        }
    }
}

/// Job priority. Higher values dispatch first within a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn value(&self) -> u8 {
        match self {
            Priority::Critical => 10,
            Priority::High => 7,
            Priority::Normal => 5,
            Priority::Low => 3,
        }
    }
}

crate::simple_display! {
    Priority {
        Critical => "critical",
        High => "high",
        Normal => "normal",
        Low => "low",
    }
}

/// A job body as the broker stores it.
///
/// The broker exclusively owns these; everything else reads snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub queue: QueueName,
    pub payload: serde_json::Value,
    /// 1..=10, see [`Priority`].
    pub priority: u8,
    pub state: JobState,
    pub attempts_made: u32,
    pub max_attempts: u32,
    /// Enqueue time. Queue-to-start latency is `processed_at_ms - created_at_ms`.
    pub created_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressValue>,
    /// Initial dispatch delay in milliseconds (0 for immediate).
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default)]
    pub stalled_count: u32,
    /// Set by cancellation of an active job; workers observe it at the
    /// next progress checkpoint or lease refresh.
    #[serde(default)]
    pub cancel_requested: bool,
}

impl JobRecord {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

crate::builder! {
    pub struct JobRecordBuilder => JobRecord {
        into {
            id: JobId = "sync-wallet-0000000000000000",
        }
        set {
            kind: JobKind = JobKind::SyncWallet,
            queue: QueueName = QueueName::WalletOperations,
            payload: serde_json::Value = serde_json::Value::Null,
            priority: u8 = 5,
            state: JobState = JobState::Waiting,
            attempts_made: u32 = 0,
            max_attempts: u32 = 3,
            created_at_ms: u64 = 1_000_000,
            delay_ms: u64 = 0,
            stalled_count: u32 = 0,
            cancel_requested: bool = false,
        }
        option {
            processed_at_ms: u64 = None,
            finished_at_ms: u64 = None,
            failed_reason: String = None,
            return_value: serde_json::Value = None,
            progress: ProgressValue = None,
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
