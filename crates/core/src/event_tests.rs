// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::job::{JobId, QueueName};

#[test]
fn topics_follow_wire_shape() {
    assert_eq!(ProgressEventKind::Progress.topic(), "job-events:progress");
    assert_eq!(ProgressEventKind::QueueToStart.topic(), "job-events:queue-to-start");
}

#[test]
fn terminal_kinds() {
    assert!(ProgressEventKind::Completed.is_terminal());
    assert!(ProgressEventKind::Failed.is_terminal());
    assert!(!ProgressEventKind::Progress.is_terminal());
    assert!(!ProgressEventKind::Active.is_terminal());
    assert!(!ProgressEventKind::QueueToStart.is_terminal());
}

#[test]
fn kind_serde_is_kebab_case() {
    let json = serde_json::to_string(&ProgressEventKind::QueueToStart).unwrap();
    assert_eq!(json, "\"queue-to-start\"");
}

#[test]
fn completed_payload_carries_both_durations() {
    let event = ProgressEvent::completed(
        JobId::new("analyze-pnl-0011223344556677"),
        QueueName::AnalysisOperations,
        &serde_json::json!({ "trades": 42 }),
        1_500,
        4_200,
        1_700_000_000_000,
    );
    assert_eq!(event.payload["processingTimeMs"], 1_500);
    assert_eq!(event.payload["totalTimeMs"], 4_200);
    assert_eq!(event.payload["returnValue"]["trades"], 42);
}

#[test]
fn queue_to_start_payload_carries_latency() {
    let event = ProgressEvent::queue_to_start(
        JobId::new("sync-wallet-0011223344556677"),
        QueueName::WalletOperations,
        830,
        1_700_000_000_000,
    );
    assert_eq!(event.kind, ProgressEventKind::QueueToStart);
    assert_eq!(event.payload["queueToStartMs"], 830);
}

#[test]
fn event_serde_round_trip() {
    let event = ProgressEvent::failed(
        JobId::new("sync-wallet-0011223344556677"),
        QueueName::WalletOperations,
        "timeout",
        3,
        1_700_000_000_000,
    );
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"jobId\""));
    let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, event);
}
