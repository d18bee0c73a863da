// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Realtime gateway: fans progress-bus events out to WebSocket clients.
//!
//! Each client keeps a per-connection set of job-id subscriptions,
//! updated by `subscribe-to-job` / `unsubscribe-from-job` messages. An
//! event is delivered iff its job id is in the client's set; delivery is
//! best-effort and ordered per job id (bus publication order).

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use wq_broker::{LockAdapter, QueueAdapter, RunStore};
use wq_core::{Clock, JobId};
use wq_engine::ProgressBus;
use wq_wire::{ClientMessage, ServerMessage};

/// One client's job subscriptions.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    jobs: HashSet<String>,
}

impl SubscriptionSet {
    pub fn apply(&mut self, message: ClientMessage) {
        match message {
            ClientMessage::SubscribeToJob { job_id } => {
                self.jobs.insert(job_id);
            }
            ClientMessage::UnsubscribeFromJob { job_id } => {
                self.jobs.remove(&job_id);
            }
        }
    }

    pub fn wants(&self, job_id: &JobId) -> bool {
        self.jobs.contains(job_id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

pub async fn ws_handler<Q, L, R, C>(
    State(state): State<Arc<AppState<Q, L, R, C>>>,
    ws: WebSocketUpgrade,
) -> Response
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    let bus = state.bus.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, bus))
}

async fn handle_socket(socket: WebSocket, bus: ProgressBus) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = bus.subscribe();
    let mut subscriptions = SubscriptionSet::default();

    let greeting = ServerMessage::Connected {
        message: "send subscribe-to-job to receive job events".to_string(),
    };
    if send_message(&mut sender, &greeting).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ClientMessage>(text.as_str()) {
                        Ok(message) => subscriptions.apply(message),
                        Err(e) => debug!(error = %e, "ignoring malformed client message"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "websocket receive error");
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if !subscriptions.wants(&event.job_id) {
                        continue;
                    }
                    let message = ServerMessage::from_event(&event);
                    if send_message(&mut sender, &message).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    // Best-effort delivery: a slow client loses the
                    // oldest events rather than stalling workers.
                    warn!(missed, "subscriber lagged behind the progress bus");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn send_message(
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).unwrap_or_default();
    sender.send(Message::Text(json.into())).await
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
