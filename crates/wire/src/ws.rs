// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime channel messages.

use serde::{Deserialize, Serialize};
use wq_core::{ProgressEvent, ProgressEventKind};

/// Messages a client sends to manage its job subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    SubscribeToJob { job_id: String },
    #[serde(rename_all = "camelCase")]
    UnsubscribeFromJob { job_id: String },
}

/// Messages the gateway pushes to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected { message: String },
    #[serde(rename_all = "camelCase")]
    JobActive { job_id: String, queue: String, payload: serde_json::Value, timestamp_ms: u64 },
    #[serde(rename_all = "camelCase")]
    JobProgress { job_id: String, queue: String, payload: serde_json::Value, timestamp_ms: u64 },
    #[serde(rename_all = "camelCase")]
    JobCompleted { job_id: String, queue: String, payload: serde_json::Value, timestamp_ms: u64 },
    #[serde(rename_all = "camelCase")]
    JobFailed { job_id: String, queue: String, payload: serde_json::Value, timestamp_ms: u64 },
    #[serde(rename_all = "camelCase")]
    JobQueueToStart {
        job_id: String,
        queue: String,
        payload: serde_json::Value,
        timestamp_ms: u64,
    },
}

impl ServerMessage {
    /// Map a bus event onto its wire message.
    pub fn from_event(event: &ProgressEvent) -> Self {
        let job_id = event.job_id.to_string();
        let queue = event.queue.as_str().to_string();
        let payload = event.payload.clone();
        let timestamp_ms = event.timestamp_ms;
        match event.kind {
            ProgressEventKind::Active => {
                ServerMessage::JobActive { job_id, queue, payload, timestamp_ms }
            }
            ProgressEventKind::Progress => {
                ServerMessage::JobProgress { job_id, queue, payload, timestamp_ms }
            }
            ProgressEventKind::Completed => {
                ServerMessage::JobCompleted { job_id, queue, payload, timestamp_ms }
            }
            ProgressEventKind::Failed => {
                ServerMessage::JobFailed { job_id, queue, payload, timestamp_ms }
            }
            ProgressEventKind::QueueToStart => {
                ServerMessage::JobQueueToStart { job_id, queue, payload, timestamp_ms }
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
