// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use wq_core::{JobId, ProgressEvent, QueueName};

#[test]
fn client_messages_parse_their_wire_tags() {
    let subscribe: ClientMessage = serde_json::from_value(json!({
        "type": "subscribe-to-job",
        "jobId": "sync-wallet-00ff",
    }))
    .unwrap();
    assert_eq!(subscribe, ClientMessage::SubscribeToJob { job_id: "sync-wallet-00ff".into() });

    let unsubscribe: ClientMessage = serde_json::from_value(json!({
        "type": "unsubscribe-from-job",
        "jobId": "sync-wallet-00ff",
    }))
    .unwrap();
    assert_eq!(
        unsubscribe,
        ClientMessage::UnsubscribeFromJob { job_id: "sync-wallet-00ff".into() }
    );
}

#[test]
fn unknown_client_messages_are_rejected() {
    let result: Result<ClientMessage, _> =
        serde_json::from_value(json!({ "type": "subscribe-to-queue" }));
    assert!(result.is_err());
}

#[test]
fn server_messages_tag_by_event_kind() {
    let event = ProgressEvent::queue_to_start(
        JobId::new("sync-wallet-00ff"),
        QueueName::WalletOperations,
        420,
        1_000,
    );
    let message = ServerMessage::from_event(&event);
    let value = serde_json::to_value(&message).unwrap();
    assert_eq!(value["type"], "job-queue-to-start");
    assert_eq!(value["jobId"], "sync-wallet-00ff");
    assert_eq!(value["payload"]["queueToStartMs"], 420);
}

#[test]
fn completed_event_maps_to_job_completed() {
    let event = ProgressEvent::completed(
        JobId::new("analyze-pnl-00ff"),
        QueueName::AnalysisOperations,
        &json!({ "trades": 3 }),
        100,
        250,
        2_000,
    );
    let value = serde_json::to_value(ServerMessage::from_event(&event)).unwrap();
    assert_eq!(value["type"], "job-completed");
    assert_eq!(value["payload"]["totalTimeMs"], 250);
}

#[test]
fn connected_greeting_shape() {
    let value = serde_json::to_value(ServerMessage::Connected {
        message: "subscribe with subscribe-to-job".to_string(),
    })
    .unwrap();
    assert_eq!(value["type"], "connected");
}
