// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress-bus events published by the worker pool.

use crate::job::{JobId, QueueName};
use crate::progress::ProgressValue;
use serde::{Deserialize, Serialize};

/// Kind of a progress-bus event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressEventKind {
    Progress,
    Active,
    Completed,
    Failed,
    QueueToStart,
}

impl ProgressEventKind {
    /// Internal publish/subscribe topic for this kind.
    pub fn topic(&self) -> &'static str {
        match self {
            ProgressEventKind::Progress => "job-events:progress",
            ProgressEventKind::Active => "job-events:active",
            ProgressEventKind::Completed => "job-events:completed",
            ProgressEventKind::Failed => "job-events:failed",
            ProgressEventKind::QueueToStart => "job-events:queue-to-start",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEventKind::Completed | ProgressEventKind::Failed)
    }
}

crate::simple_display! {
    ProgressEventKind {
        Progress => "progress",
        Active => "active",
        Completed => "completed",
        Failed => "failed",
        QueueToStart => "queue-to-start",
    }
}

/// An immutable event record published to the process-wide topic.
///
/// Events are ordered per job id in publication order; terminal kinds are
/// published exactly once per terminal transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub job_id: JobId,
    pub queue: QueueName,
    pub kind: ProgressEventKind,
    pub payload: serde_json::Value,
    pub timestamp_ms: u64,
}

impl ProgressEvent {
    pub fn active(job_id: JobId, queue: QueueName, attempts_made: u32, timestamp_ms: u64) -> Self {
        Self {
            job_id,
            queue,
            kind: ProgressEventKind::Active,
            payload: serde_json::json!({ "attemptsMade": attempts_made }),
            timestamp_ms,
        }
    }

    pub fn progress(
        job_id: JobId,
        queue: QueueName,
        value: &ProgressValue,
        timestamp_ms: u64,
    ) -> Self {
        let payload = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        Self { job_id, queue, kind: ProgressEventKind::Progress, payload, timestamp_ms }
    }

    /// `queue-to-start` carries the waiting-room latency: `processedOn - enqueuedAt`.
    pub fn queue_to_start(
        job_id: JobId,
        queue: QueueName,
        queue_to_start_ms: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            job_id,
            queue,
            kind: ProgressEventKind::QueueToStart,
            payload: serde_json::json!({ "queueToStartMs": queue_to_start_ms }),
            timestamp_ms,
        }
    }

    /// `completed` carries the handler-measured and end-to-end durations.
    pub fn completed(
        job_id: JobId,
        queue: QueueName,
        return_value: &serde_json::Value,
        processing_time_ms: u64,
        total_time_ms: u64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            job_id,
            queue,
            kind: ProgressEventKind::Completed,
            payload: serde_json::json!({
                "returnValue": return_value,
                "processingTimeMs": processing_time_ms,
                "totalTimeMs": total_time_ms,
            }),
            timestamp_ms,
        }
    }

    pub fn failed(
        job_id: JobId,
        queue: QueueName,
        reason: &str,
        attempts_made: u32,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            job_id,
            queue,
            kind: ProgressEventKind::Failed,
            payload: serde_json::json!({
                "failedReason": reason,
                "attemptsMade": attempts_made,
            }),
            timestamp_ms,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
