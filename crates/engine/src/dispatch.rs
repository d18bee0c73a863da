// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job dispatcher: validation, deterministic ids, routing, single-flight
//! admission, and the dashboard scope gate.
//!
//! Dispatch never blocks on worker completion; every call returns a
//! receipt describing what was (or was not) enqueued.

use crate::scope::{self, DashboardRequest};
use crate::validate;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};
use wq_broker::{
    BrokerError, EnqueueOutcome, EnqueueSpec, LockAdapter, QueueAdapter, RemoveOutcome, RunStore,
};
use wq_core::{
    derive_job_id, AnalysisScope, Clock, DashboardAnalysisPayload, EnrichTokenBalancesPayload,
    HolderProfilesPayload, JobId, JobKind, JobState, QueueName, RequestId, SimilarityFlowPayload,
    VectorType, WalletBalances,
};

/// Margin added to a kind's timeout when sizing dispatch-lock TTLs, so a
/// lock always outlives a healthy worker but never a crashed one.
const LOCK_TTL_MARGIN_MS: u64 = 60_000;

/// Dispatch failures. `AlreadyInProgress` is not here: duplicate work is
/// an idempotent success carrying the existing job.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Reply status for an intake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Queued,
    Running,
    Skipped,
    Completed,
    Failed,
}

impl DispatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::Queued => "queued",
            DispatchStatus::Running => "running",
            DispatchStatus::Skipped => "skipped",
            DispatchStatus::Completed => "completed",
            DispatchStatus::Failed => "failed",
        }
    }

    fn from_state(state: JobState) -> Self {
        match state {
            JobState::Active => DispatchStatus::Running,
            JobState::Completed => DispatchStatus::Completed,
            JobState::Failed => DispatchStatus::Failed,
            JobState::Waiting | JobState::Delayed | JobState::Paused => DispatchStatus::Queued,
        }
    }
}

/// What a dispatch call did.
#[derive(Debug, Clone)]
pub struct DispatchReceipt {
    pub job_id: Option<JobId>,
    pub request_id: RequestId,
    pub status: DispatchStatus,
    pub queue: QueueName,
    pub kind: JobKind,
    pub analysis_scope: Option<AnalysisScope>,
    pub estimated_processing_time: Option<&'static str>,
    pub skipped: bool,
    pub skip_reason: Option<String>,
    pub queued_follow_up_scopes: Vec<AnalysisScope>,
    pub already_running: bool,
    pub wallet_count: Option<usize>,
    pub token_count: Option<usize>,
}

impl DispatchReceipt {
    fn new(kind: JobKind) -> Self {
        Self {
            job_id: None,
            request_id: RequestId::new(),
            status: DispatchStatus::Queued,
            queue: kind.queue(),
            kind,
            analysis_scope: None,
            estimated_processing_time: None,
            skipped: false,
            skip_reason: None,
            queued_follow_up_scopes: Vec::new(),
            already_running: false,
            wallet_count: None,
            token_count: None,
        }
    }

    fn existing(mut self, job_id: JobId, state: JobState) -> Self {
        self.job_id = Some(job_id);
        self.status = DispatchStatus::from_state(state);
        self.already_running = true;
        self
    }
}

/// C2: the job dispatcher.
#[derive(Clone)]
pub struct Dispatcher<Q, L, R, C> {
    queues: Q,
    locks: L,
    runs: R,
    clock: C,
}

impl<Q, L, R, C> Dispatcher<Q, L, R, C>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    pub fn new(queues: Q, locks: L, runs: R, clock: C) -> Self {
        Self { queues, locks, runs, clock }
    }

    // ── Simple single-wallet kinds ──────────────────────────────────────

    pub async fn dispatch_sync_wallet(
        &self,
        wallet: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        validate::validate_address("walletAddress", wallet)?;
        self.single_flight(JobKind::SyncWallet, wallet, wallet_payload(wallet), RequestId::new())
            .await
    }

    pub async fn dispatch_analyze_pnl(
        &self,
        wallet: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        validate::validate_address("walletAddress", wallet)?;
        self.single_flight(JobKind::AnalyzePnl, wallet, wallet_payload(wallet), RequestId::new())
            .await
    }

    pub async fn dispatch_analyze_behavior(
        &self,
        wallet: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        validate::validate_address("walletAddress", wallet)?;
        self.single_flight(
            JobKind::AnalyzeBehavior,
            wallet,
            wallet_payload(wallet),
            RequestId::new(),
        )
        .await
    }

    // ── Dashboard scope flow (C5) ───────────────────────────────────────

    pub async fn dispatch_dashboard(
        &self,
        req: DashboardRequest,
    ) -> Result<DispatchReceipt, DispatchError> {
        validate::validate_address("walletAddress", &req.wallet_address)?;

        let kind = JobKind::DashboardWalletAnalysis;
        let request_id = RequestId::new();
        let payload = scope::resolve_payload(&req, request_id.to_string());
        let scope_name = payload.scope;

        let mut receipt = DispatchReceipt::new(kind);
        receipt.request_id = request_id.clone();
        receipt.analysis_scope = Some(scope_name);
        receipt.estimated_processing_time = Some(scope_name.estimated_processing_time());

        // Freshness gate.
        let last_run =
            self.runs.latest_completed(&req.wallet_address, scope_name).await?;
        if let Some(reason) = scope::freshness_skip(
            self.clock.epoch_ms(),
            scope_name,
            last_run.as_ref(),
            req.force_refresh,
        ) {
            debug!(wallet = %req.wallet_address, scope = %scope_name, %reason, "dashboard skipped");
            receipt.status = DispatchStatus::Skipped;
            receipt.skipped = true;
            receipt.skip_reason = Some(reason);
            return Ok(receipt);
        }

        // In-flight dedup: queue scan first (the active job always wins
        // over a stale lock), then the dashboard lock.
        let queue = kind.queue();
        for state in [JobState::Active, JobState::Waiting, JobState::Delayed] {
            let jobs = self.queues.jobs_in_state(queue, state, 0, 512).await?;
            if let Some(job) = scope::find_in_flight(&jobs, &req.wallet_address, scope_name) {
                return Ok(receipt.existing(job.id.clone(), job.state));
            }
        }

        let lock_key = lock_key_for(kind, &req.wallet_address);
        if let Some(owner) = self.locks.owner(&lock_key).await? {
            match self.queues.get_job(&JobId::new(owner.clone())).await? {
                Some(job) if !job.is_terminal() => {
                    return Ok(receipt.existing(job.id, JobState::Active));
                }
                // Stale lock: owner finished or vanished. Clear it (CAS on
                // the observed owner) and continue to enqueue.
                _ => {
                    let _ = self.locks.release(&lock_key, &owner).await?;
                }
            }
        }

        // Re-runs of a finished id require a fresh identity; forceRefresh
        // folds the request id into the derivation.
        let natural_key =
            DashboardAnalysisPayload::natural_key(&req.wallet_address, scope_name);
        let refresh_salt = req.force_refresh.then(|| request_id.as_str());
        let job_id = derive_job_id(kind, &natural_key, refresh_salt);

        let ttl_ms = payload.timeout_minutes * 60_000 + LOCK_TTL_MARGIN_MS;
        if !self.locks.acquire(&lock_key, job_id.as_str(), ttl_ms).await? {
            // Lost a dispatch race; whoever holds the lock owns the run.
            if let Some(owner) = self.locks.owner(&lock_key).await? {
                let state = self
                    .queues
                    .get_job(&JobId::new(owner.clone()))
                    .await?
                    .map(|j| j.state)
                    .unwrap_or(JobState::Active);
                return Ok(receipt.existing(JobId::new(owner), state));
            }
        }

        let follow_ups = payload.follow_up_scopes();
        let payload_json = serde_json::to_value(&payload)
            .map_err(|e| DispatchError::InvalidInput(e.to_string()))?;
        let spec = EnqueueSpec::new(job_id.clone(), kind, payload_json)
            .priority(scope_name.priority().value());

        match self.queues.add(spec).await? {
            EnqueueOutcome::Enqueued(job) => {
                info!(job_id = %job.id, wallet = %req.wallet_address, scope = %scope_name, "dashboard analysis queued");
                receipt.job_id = Some(job.id);
                receipt.status = DispatchStatus::Queued;
                receipt.queued_follow_up_scopes = follow_ups;
                Ok(receipt)
            }
            EnqueueOutcome::AlreadyQueued(job) => Ok(receipt.existing(job.id, job.state)),
            EnqueueOutcome::TerminalExists(job) => {
                // Idempotent replay of a finished id: hand back the prior
                // terminal job and give up the admission lock.
                let _ = self.locks.release(&lock_key, job_id.as_str()).await?;
                let state = job.state;
                let mut receipt = receipt.existing(job.id, state);
                receipt.already_running = false;
                Ok(receipt)
            }
        }
    }

    // ── Similarity / enrichment / holder profiles ───────────────────────

    pub async fn dispatch_similarity(
        &self,
        wallet_addresses: Vec<String>,
        vector_type: Option<VectorType>,
    ) -> Result<DispatchReceipt, DispatchError> {
        validate::validate_addresses("walletAddresses", &wallet_addresses, 2)?;

        let request_id = RequestId::new();
        let payload = SimilarityFlowPayload {
            request_id: request_id.to_string(),
            wallet_addresses,
            vector_type: vector_type.unwrap_or_default(),
        };
        let wallet_count = payload.wallet_addresses.len();
        let payload_json = serde_json::to_value(&payload)
            .map_err(|e| DispatchError::InvalidInput(e.to_string()))?;

        let mut receipt = self
            .single_flight(
                JobKind::SimilarityAnalysisFlow,
                &payload.request_id,
                payload_json,
                request_id,
            )
            .await?;
        receipt.estimated_processing_time = Some("~5 minutes");
        receipt.wallet_count = Some(wallet_count);
        Ok(receipt)
    }

    pub async fn dispatch_enrich_balances(
        &self,
        wallet_balances: BTreeMap<String, WalletBalances>,
    ) -> Result<DispatchReceipt, DispatchError> {
        if wallet_balances.is_empty() {
            return Err(DispatchError::InvalidInput(
                "walletBalances must not be empty".to_string(),
            ));
        }
        let wallets: Vec<String> = wallet_balances.keys().cloned().collect();
        validate::validate_addresses("walletBalances", &wallets, 1)?;

        let payload = EnrichTokenBalancesPayload { wallet_balances };
        let wallet_count = payload.wallet_count();
        let token_count = payload.token_count();
        let kind = JobKind::EnrichTokenBalances;
        let job_id = derive_job_id(kind, &payload.natural_key(), None);
        let payload_json = serde_json::to_value(&payload)
            .map_err(|e| DispatchError::InvalidInput(e.to_string()))?;

        let mut receipt = DispatchReceipt::new(kind);
        receipt.estimated_processing_time = Some("~2 minutes");
        receipt.wallet_count = Some(wallet_count);
        receipt.token_count = Some(token_count);

        match self.queues.add(EnqueueSpec::new(job_id, kind, payload_json)).await? {
            EnqueueOutcome::Enqueued(job) => {
                receipt.job_id = Some(job.id);
                Ok(receipt)
            }
            EnqueueOutcome::AlreadyQueued(job) | EnqueueOutcome::TerminalExists(job) => {
                let state = job.state;
                Ok(receipt.existing(job.id, state))
            }
        }
    }

    pub async fn dispatch_holder_profiles_token(
        &self,
        token_mint: &str,
        top_n: Option<u32>,
    ) -> Result<DispatchReceipt, DispatchError> {
        validate::validate_address("tokenMint", token_mint)?;
        let top_n = top_n.unwrap_or(10);
        validate::validate_top_n(top_n)?;

        let payload =
            HolderProfilesPayload::Token { token_mint: token_mint.to_string(), top_n };
        self.dispatch_holder_profiles(payload).await
    }

    pub async fn dispatch_holder_profiles_wallet(
        &self,
        wallet: &str,
    ) -> Result<DispatchReceipt, DispatchError> {
        validate::validate_address("walletAddress", wallet)?;
        let payload = HolderProfilesPayload::Wallet { wallet_address: wallet.to_string() };
        self.dispatch_holder_profiles(payload).await
    }

    async fn dispatch_holder_profiles(
        &self,
        payload: HolderProfilesPayload,
    ) -> Result<DispatchReceipt, DispatchError> {
        let kind = JobKind::AnalyzeHolderProfiles;
        let job_id = derive_job_id(kind, &payload.natural_key(), None);
        let payload_json = serde_json::to_value(&payload)
            .map_err(|e| DispatchError::InvalidInput(e.to_string()))?;

        let mut receipt = DispatchReceipt::new(kind);
        receipt.estimated_processing_time = Some("~1 minute");
        match self.queues.add(EnqueueSpec::new(job_id, kind, payload_json)).await? {
            EnqueueOutcome::Enqueued(job) => {
                receipt.job_id = Some(job.id);
                Ok(receipt)
            }
            EnqueueOutcome::AlreadyQueued(job) | EnqueueOutcome::TerminalExists(job) => {
                let state = job.state;
                Ok(receipt.existing(job.id, state))
            }
        }
    }

    // ── Cancellation ────────────────────────────────────────────────────

    /// Remove a waiting job or request abort of an active one.
    pub async fn cancel_job(&self, id: &JobId) -> Result<RemoveOutcome, DispatchError> {
        Ok(self.queues.remove(id).await?)
    }

    // ── Single-flight plumbing ──────────────────────────────────────────

    async fn single_flight(
        &self,
        kind: JobKind,
        natural_key: &str,
        payload: serde_json::Value,
        request_id: RequestId,
    ) -> Result<DispatchReceipt, DispatchError> {
        let job_id = derive_job_id(kind, natural_key, None);
        let lock_key = lock_key_for(kind, natural_key);
        let ttl_ms = kind.default_timeout().as_millis() as u64 + LOCK_TTL_MARGIN_MS;

        let mut receipt = DispatchReceipt::new(kind);
        receipt.request_id = request_id;

        if !self.locks.acquire(&lock_key, job_id.as_str(), ttl_ms).await? {
            if let Some(owner) = self.locks.owner(&lock_key).await? {
                match self.queues.get_job(&JobId::new(owner.clone())).await? {
                    Some(job) if !job.is_terminal() => {
                        debug!(%lock_key, owner, "single-flight duplicate suppressed");
                        return Ok(receipt.existing(job.id, job.state));
                    }
                    // Stale lock; clear and take it over.
                    _ => {
                        let _ = self.locks.release(&lock_key, &owner).await?;
                        if !self.locks.acquire(&lock_key, job_id.as_str(), ttl_ms).await? {
                            return Ok(receipt.existing(JobId::new(owner), JobState::Active));
                        }
                    }
                }
            }
        }

        match self.queues.add(EnqueueSpec::new(job_id.clone(), kind, payload)).await? {
            EnqueueOutcome::Enqueued(job) => {
                info!(job_id = %job.id, kind = %kind, "job queued");
                receipt.job_id = Some(job.id);
                Ok(receipt)
            }
            EnqueueOutcome::AlreadyQueued(job) => Ok(receipt.existing(job.id, job.state)),
            EnqueueOutcome::TerminalExists(job) => {
                let _ = self.locks.release(&lock_key, job_id.as_str()).await?;
                let state = job.state;
                let mut receipt = receipt.existing(job.id, state);
                receipt.already_running = false;
                Ok(receipt)
            }
        }
    }
}

fn wallet_payload(wallet: &str) -> serde_json::Value {
    serde_json::json!({ "walletAddress": wallet })
}

/// Lock key for a single-flight kind. The fallback shape is unreachable
/// for the kinds the routing table marks single-flight.
pub(crate) fn lock_key_for(kind: JobKind, natural_key: &str) -> String {
    kind.lock_key(natural_key)
        .unwrap_or_else(|| format!("lock:unkeyed:{}:{natural_key}", kind.as_str()))
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
