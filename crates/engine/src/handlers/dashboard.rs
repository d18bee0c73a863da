// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard scope handler: run the scoped analysis, persist the run,
//! then enqueue the cascading follow-up scopes.

use super::{parse_payload, HandlerError, Handlers};
use crate::progress::{ProgressReporter, ProgressSink};
use crate::scope;
use tracing::{info, warn};
use wq_broker::{EnqueueSpec, ProfilesCache, QueueAdapter, RunStore};
use wq_core::{
    derive_job_id, AnalysisRun, Clock, DashboardAnalysisPayload, JobKind, JobRecord, RequestId,
    RunStatus,
};

pub(super) async fn run<Q, R, P, C, S>(
    h: &Handlers<Q, R, P, C>,
    job: &JobRecord,
    reporter: &ProgressReporter<Q, S, C>,
) -> Result<serde_json::Value, HandlerError>
where
    Q: QueueAdapter,
    R: RunStore,
    P: ProfilesCache,
    C: Clock,
    S: ProgressSink,
{
    let payload: DashboardAnalysisPayload = parse_payload(job)?;
    reporter.stage("analysis", "running scoped wallet analysis").await?;

    let result = h.analyzers.dashboard.analyze_dashboard(&payload, reporter).await?;

    // Persist the run first: the freshness gate must see this run before
    // any follow-up (or duplicate request) consults it.
    h.runs
        .record_run(&AnalysisRun {
            wallet_address: payload.wallet_address.clone(),
            scope: payload.scope,
            run_timestamp_ms: h.clock.epoch_ms(),
            status: RunStatus::Completed,
        })
        .await?;

    if let Err(e) = h.cache.invalidate_for_wallet(&payload.wallet_address).await {
        warn!(wallet = %payload.wallet_address, error = %e, "post-analysis cache invalidation failed");
    }

    // Cascade. The wallet's dashboard lock is still held by this job, so
    // follow-ups enqueue directly rather than through dispatcher
    // admission; later requests dedup against the queued jobs.
    let mut queued = Vec::new();
    for follow_req in scope::follow_up_requests(&payload) {
        let follow_payload = scope::resolve_payload(&follow_req, RequestId::new().to_string());
        let scope_name = follow_payload.scope;
        let natural_key = DashboardAnalysisPayload::natural_key(
            &follow_payload.wallet_address,
            scope_name,
        );
        let id = derive_job_id(JobKind::DashboardWalletAnalysis, &natural_key, None);
        let payload_json = serde_json::to_value(&follow_payload)
            .map_err(|e| HandlerError::Permanent(format!("follow-up payload: {e}")))?;
        let spec = EnqueueSpec::new(id, JobKind::DashboardWalletAnalysis, payload_json)
            .priority(scope_name.priority().value());

        let outcome = h.queues.add(spec).await?;
        if !outcome.existed() {
            info!(
                wallet = %payload.wallet_address,
                from = %payload.scope,
                to = %scope_name,
                job_id = %outcome.job().id,
                "queued follow-up scope"
            );
        }
        queued.push(scope_name);
    }

    Ok(serde_json::json!({
        "walletAddress": payload.wallet_address,
        "scope": payload.scope,
        "result": result,
        "queuedFollowUpScopes": queued,
    }))
}
