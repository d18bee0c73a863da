// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed per-kind job handlers.
//!
//! The worker pool resolves handlers by matching on [`JobKind`]; the
//! closed enum makes resolution total, and a record whose kind cannot be
//! decoded never reaches this layer (the broker rejects it as corrupt).

mod dashboard;
mod holder_profiles;
mod similarity;
mod wallet;

use crate::analyzers::{AnalyzerError, AnalyzerErrorKind, AnalyzerSet};
use crate::progress::{Aborted, ProgressReporter, ProgressSink};
use serde::de::DeserializeOwned;
use thiserror::Error;
use wq_broker::{BrokerError, ProfilesCache, QueueAdapter, RunStore};
use wq_core::{Clock, JobKind, JobRecord};

/// Handler failures, classified for the retry machinery.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Transient; retry within the attempt budget.
    #[error("{0}")]
    Recoverable(String),
    /// Schema errors, impossible requests; retrying cannot help.
    #[error("{0}")]
    Permanent(String),
    /// The watchdog fired.
    #[error("timeout")]
    Timeout,
    /// Cancellation observed at a checkpoint.
    #[error("cancelled")]
    Cancelled,
    /// Broker transport fault. Never counted against the attempt budget;
    /// the lease lapses and the stalled sweep re-delivers.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl From<AnalyzerError> for HandlerError {
    fn from(e: AnalyzerError) -> Self {
        match e.kind {
            AnalyzerErrorKind::Retryable => HandlerError::Recoverable(e.message),
            AnalyzerErrorKind::Permanent => HandlerError::Permanent(e.message),
            AnalyzerErrorKind::Cancelled => HandlerError::Cancelled,
        }
    }
}

impl From<Aborted> for HandlerError {
    fn from(_: Aborted) -> Self {
        HandlerError::Cancelled
    }
}

/// Decode a job payload into its kind's schema.
fn parse_payload<T: DeserializeOwned>(job: &JobRecord) -> Result<T, HandlerError> {
    serde_json::from_value(job.payload.clone())
        .map_err(|e| HandlerError::Permanent(format!("payload schema error: {e}")))
}

/// All per-kind handlers plus the collaborators they drive.
#[derive(Clone)]
pub struct Handlers<Q, R, P, C> {
    pub(crate) analyzers: AnalyzerSet,
    pub(crate) queues: Q,
    pub(crate) runs: R,
    pub(crate) cache: P,
    pub(crate) clock: C,
}

impl<Q, R, P, C> Handlers<Q, R, P, C>
where
    Q: QueueAdapter,
    R: RunStore,
    P: ProfilesCache,
    C: Clock,
{
    pub fn new(analyzers: AnalyzerSet, queues: Q, runs: R, cache: P, clock: C) -> Self {
        Self { analyzers, queues, runs, cache, clock }
    }

    /// Run the handler for a reserved job.
    pub async fn run<S: ProgressSink>(
        &self,
        job: &JobRecord,
        reporter: &ProgressReporter<Q, S, C>,
    ) -> Result<serde_json::Value, HandlerError> {
        match job.kind {
            JobKind::SyncWallet => wallet::sync(self, job, reporter).await,
            JobKind::AnalyzePnl => wallet::pnl(self, job, reporter).await,
            JobKind::AnalyzeBehavior => wallet::behavior(self, job, reporter).await,
            JobKind::DashboardWalletAnalysis => dashboard::run(self, job, reporter).await,
            JobKind::SimilarityAnalysisFlow => similarity::flow(self, job, reporter).await,
            JobKind::EnrichTokenBalances => similarity::enrich(self, job, reporter).await,
            JobKind::AnalyzeHolderProfiles => holder_profiles::run(self, job, reporter).await,
        }
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
