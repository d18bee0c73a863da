// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP intake and job read API.
//!
//! Enqueue endpoints answer 202 (including idempotent replays and
//! freshness skips); validation failures answer 400, unknown jobs 404,
//! broker unavailability 503.

use crate::gateway;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use wq_broker::{BrokerError, LockAdapter, QueueAdapter, RemoveOutcome, RunStore};
use wq_core::{AnalysisScope, Clock, JobId, JobState, QueueName, VectorType};
use wq_engine::{DashboardRequest, DispatchError, DispatchReceipt};
use wq_wire::{
    DashboardAnalysisRequest, EnrichBalancesRequest, ErrorBody, HolderProfilesTokenRequest,
    HolderProfilesWalletRequest, JobCounts, JobDetail, JobListEntry, JobProgressView,
    JobResultView, QueueJobResponse, QueueJobsResponse, QueueStatsResponse,
    SimilarityQueueRequest,
};

/// API-level failure, mapped onto the error taxonomy.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Infra(String),
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::InvalidInput(msg) => ApiError::BadRequest(msg),
            DispatchError::Broker(e) => ApiError::from(e),
        }
    }
}

impl From<BrokerError> for ApiError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Unsupported { .. } => ApiError::BadRequest(e.to_string()),
            BrokerError::Transport(_) | BrokerError::Corrupt { .. } => {
                ApiError::Infra(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody::invalid_input(msg))).into_response()
            }
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(ErrorBody::not_found(msg))).into_response()
            }
            ApiError::Infra(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody::infra_unavailable(msg)),
            )
                .into_response(),
        }
    }
}

/// Build the full API router.
pub fn router<Q, L, R, C>(state: Arc<AppState<Q, L, R, C>>) -> Router
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    Router::new()
        .route(
            "/analyses/wallets/dashboard-analysis",
            post(queue_dashboard::<Q, L, R, C>),
        )
        .route("/analyses/similarity/queue", post(queue_similarity::<Q, L, R, C>))
        .route(
            "/analyses/similarity/enrich-balances",
            post(queue_enrich_balances::<Q, L, R, C>),
        )
        .route(
            "/analyses/holder-profiles",
            post(queue_holder_profiles_token::<Q, L, R, C>),
        )
        .route(
            "/analyses/holder-profiles/wallet",
            post(queue_holder_profiles_wallet::<Q, L, R, C>),
        )
        .route("/jobs", get(queues_overview::<Q, L, R, C>))
        .route(
            "/jobs/{id}",
            get(get_job::<Q, L, R, C>).delete(delete_job::<Q, L, R, C>),
        )
        .route("/jobs/{id}/progress", get(get_job_progress::<Q, L, R, C>))
        .route("/jobs/{id}/result", get(get_job_result::<Q, L, R, C>))
        .route("/jobs/queue/{name}/stats", get(queue_stats::<Q, L, R, C>))
        .route("/jobs/queue/{name}/jobs", get(queue_jobs::<Q, L, R, C>))
        .route("/ws/jobs", get(gateway::ws_handler::<Q, L, R, C>))
        .with_state(state)
}

fn queue_response(receipt: DispatchReceipt) -> QueueJobResponse {
    let monitoring_url = receipt.job_id.as_ref().map(|id| format!("/jobs/{id}"));
    QueueJobResponse {
        job_id: receipt.job_id.map(|id| id.to_string()),
        request_id: receipt.request_id.to_string(),
        status: receipt.status.as_str().to_string(),
        queue_name: receipt.queue.as_str().to_string(),
        analysis_scope: receipt.analysis_scope.map(|s| s.as_str().to_string()),
        estimated_processing_time: receipt.estimated_processing_time.map(str::to_string),
        monitoring_url,
        skipped: receipt.skipped,
        skip_reason: receipt.skip_reason,
        queued_follow_up_scopes: receipt
            .queued_follow_up_scopes
            .iter()
            .map(|s| s.as_str().to_string())
            .collect(),
        already_running: receipt.already_running,
        wallet_count: receipt.wallet_count,
        token_count: receipt.token_count,
    }
}

async fn queue_dashboard<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Json(body): Json<DashboardAnalysisRequest>,
) -> Result<Response, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let analysis_scope = match body.analysis_scope.as_deref() {
        None => None,
        Some(raw) => Some(
            raw.parse::<AnalysisScope>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
    };
    let req = DashboardRequest {
        wallet_address: body.wallet_address,
        analysis_scope,
        trigger_source: body.trigger_source,
        history_window_days: body.history_window_days,
        target_signature_count: body.target_signature_count,
        force_refresh: body.force_refresh.unwrap_or(false),
        enrich_metadata: body.enrich_metadata.unwrap_or(false),
        queue_working_after: body.queue_working_after.unwrap_or(false),
        queue_deep_after: body.queue_deep_after.unwrap_or(false),
        timeout_minutes: body.timeout_minutes,
    };
    let receipt = state.dispatcher.dispatch_dashboard(req).await?;
    Ok((StatusCode::ACCEPTED, Json(queue_response(receipt))).into_response())
}

async fn queue_similarity<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Json(body): Json<SimilarityQueueRequest>,
) -> Result<Response, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let vector_type = match body.vector_type.as_deref() {
        None => None,
        Some("capital") => Some(VectorType::Capital),
        Some("binary") => Some(VectorType::Binary),
        Some(other) => {
            return Err(ApiError::BadRequest(format!("unknown vector type: {other}")))
        }
    };
    let receipt = state
        .dispatcher
        .dispatch_similarity(body.wallet_addresses, vector_type)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(queue_response(receipt))).into_response())
}

async fn queue_enrich_balances<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Json(body): Json<EnrichBalancesRequest>,
) -> Result<Response, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let receipt = state.dispatcher.dispatch_enrich_balances(body.wallet_balances).await?;
    Ok((StatusCode::ACCEPTED, Json(queue_response(receipt))).into_response())
}

async fn queue_holder_profiles_token<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Json(body): Json<HolderProfilesTokenRequest>,
) -> Result<Response, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let receipt = state
        .dispatcher
        .dispatch_holder_profiles_token(&body.token_mint, body.top_n)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(queue_response(receipt))).into_response())
}

async fn queue_holder_profiles_wallet<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Json(body): Json<HolderProfilesWalletRequest>,
) -> Result<Response, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let receipt = state
        .dispatcher
        .dispatch_holder_profiles_wallet(&body.wallet_address)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(queue_response(receipt))).into_response())
}

async fn get_job<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Path(id): Path<String>,
) -> Result<Json<JobDetail>, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let job = state
        .queues
        .get_job(&JobId::new(id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job {id}")))?;
    Ok(Json(JobDetail::from(&job)))
}

async fn get_job_progress<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Path(id): Path<String>,
) -> Result<Json<JobProgressView>, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let job = state
        .queues
        .get_job(&JobId::new(id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job {id}")))?;
    Ok(Json(JobProgressView {
        job_id: job.id.to_string(),
        status: job.state.to_string(),
        progress: job.progress,
    }))
}

async fn get_job_result<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Path(id): Path<String>,
) -> Result<Json<JobResultView>, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let job = state
        .queues
        .get_job(&JobId::new(id.clone()))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no job {id}")))?;
    Ok(Json(JobResultView {
        job_id: job.id.to_string(),
        status: job.state.to_string(),
        attempts_made: job.attempts_made,
        return_value: job.return_value,
        failed_reason: job.failed_reason,
    }))
}

async fn delete_job<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    match state.dispatcher.cancel_job(&JobId::new(id.clone())).await? {
        RemoveOutcome::Removed => Ok((
            StatusCode::OK,
            Json(serde_json::json!({ "jobId": id, "status": "removed" })),
        )
            .into_response()),
        RemoveOutcome::AbortRequested => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "jobId": id, "status": "abort-requested" })),
        )
            .into_response()),
        RemoveOutcome::NotFound => Err(ApiError::NotFound(format!("no job {id}"))),
    }
}

fn counts_view(counts: wq_broker::QueueCounts) -> JobCounts {
    JobCounts {
        waiting: counts.waiting,
        active: counts.active,
        completed: counts.completed,
        failed: counts.failed,
        delayed: counts.delayed,
        paused: counts.paused,
    }
}

async fn queues_overview<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
) -> Result<Json<Vec<QueueStatsResponse>>, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let mut overview = Vec::with_capacity(QueueName::ALL.len());
    for queue in QueueName::ALL {
        let counts = state.queues.counts(queue).await?;
        overview.push(QueueStatsResponse {
            queue_name: queue.as_str().to_string(),
            counts: counts_view(counts),
        });
    }
    Ok(Json(overview))
}

async fn queue_stats<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Path(name): Path<String>,
) -> Result<Json<QueueStatsResponse>, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let queue = name
        .parse::<QueueName>()
        .map_err(|_| ApiError::NotFound(format!("no queue {name}")))?;
    let counts = state.queues.counts(queue).await?;
    Ok(Json(QueueStatsResponse {
        queue_name: queue.as_str().to_string(),
        counts: counts_view(counts),
    }))
}

#[derive(Debug, Deserialize)]
struct JobsQuery {
    status: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn queue_jobs<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    Path(name): Path<String>,
    Query(query): Query<JobsQuery>,
) -> Result<Json<QueueJobsResponse>, ApiError>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let queue = name
        .parse::<QueueName>()
        .map_err(|_| ApiError::NotFound(format!("no queue {name}")))?;
    let status = query.status.as_deref().unwrap_or("waiting");
    let state_filter = status
        .parse::<JobState>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(20).min(100);

    let jobs = state.queues.jobs_in_state(queue, state_filter, offset, limit).await?;
    Ok(Json(QueueJobsResponse {
        queue_name: queue.as_str().to_string(),
        status: status.to_string(),
        jobs: jobs.iter().map(JobListEntry::from).collect(),
        offset,
        limit,
    }))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
