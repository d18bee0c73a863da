// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Response bodies for the intake and job read APIs.

use serde::Serialize;
use wq_core::{JobRecord, ProgressValue};

/// 202 body for every enqueue-style endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJobResponse {
    pub job_id: Option<String>,
    pub request_id: String,
    /// `queued`, `running`, `skipped`, or a terminal state on idempotent
    /// replay of a finished id.
    pub status: String,
    pub queue_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_processing_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_url: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub queued_follow_up_scopes: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub already_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
}

/// One job, as the read API exposes it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub job_id: String,
    pub kind: String,
    pub queue_name: String,
    pub status: String,
    pub priority: u8,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub created_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressValue>,
}

impl From<&JobRecord> for JobDetail {
    fn from(job: &JobRecord) -> Self {
        Self {
            job_id: job.id.to_string(),
            kind: job.kind.as_str().to_string(),
            queue_name: job.queue.as_str().to_string(),
            status: job.state.to_string(),
            priority: job.priority,
            attempts_made: job.attempts_made,
            max_attempts: job.max_attempts,
            created_at_ms: job.created_at_ms,
            processed_at_ms: job.processed_at_ms,
            finished_at_ms: job.finished_at_ms,
            failed_reason: job.failed_reason.clone(),
            progress: job.progress.clone(),
        }
    }
}

/// `GET /jobs/{id}/progress`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressView {
    pub job_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressValue>,
}

/// `GET /jobs/{id}/result`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResultView {
    pub job_id: String,
    pub status: String,
    pub attempts_made: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_reason: Option<String>,
}

/// Per-state counts for one queue.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    pub failed: u64,
    pub delayed: u64,
    pub paused: bool,
}

/// `GET /jobs/queue/{name}/stats`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatsResponse {
    pub queue_name: String,
    pub counts: JobCounts,
}

/// A row in queue job listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobListEntry {
    pub job_id: String,
    pub kind: String,
    pub status: String,
    pub priority: u8,
    pub attempts_made: u32,
    pub created_at_ms: u64,
}

impl From<&JobRecord> for JobListEntry {
    fn from(job: &JobRecord) -> Self {
        Self {
            job_id: job.id.to_string(),
            kind: job.kind.as_str().to_string(),
            status: job.state.to_string(),
            priority: job.priority,
            attempts_made: job.attempts_made,
            created_at_ms: job.created_at_ms,
        }
    }
}

/// `GET /jobs/queue/{name}/jobs`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueJobsResponse {
    pub queue_name: String,
    pub status: String,
    pub jobs: Vec<JobListEntry>,
    pub offset: usize,
    pub limit: usize,
}

/// Error body for 4xx responses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self { error: "invalid-input".to_string(), message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { error: "not-found".to_string(), message: message.into() }
    }

    pub fn infra_unavailable(message: impl Into<String>) -> Self {
        Self { error: "infra-unavailable".to_string(), message: message.into() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
