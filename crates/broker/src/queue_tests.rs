// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use wq_core::JobKind;

fn minimal_map(id: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert("id".to_string(), id.to_string());
    map.insert("kind".to_string(), "sync-wallet".to_string());
    map.insert("queue".to_string(), "wallet-operations".to_string());
    map.insert("state".to_string(), "waiting".to_string());
    map.insert("payload".to_string(), r#"{"walletAddress":"W1"}"#.to_string());
    map.insert("priority".to_string(), "5".to_string());
    map.insert("attemptsMade".to_string(), "0".to_string());
    map.insert("maxAttempts".to_string(), "3".to_string());
    map.insert("createdAtMs".to_string(), "1000000".to_string());
    map.insert("delayMs".to_string(), "0".to_string());
    map.insert("stalledCount".to_string(), "0".to_string());
    map.insert("cancelRequested".to_string(), "0".to_string());
    map
}

#[test]
fn parse_record_round_trips_a_minimal_hash() {
    let map = minimal_map("sync-wallet-abc");
    let job = parse_record(&map).unwrap();
    assert_eq!(job.id, "sync-wallet-abc");
    assert_eq!(job.kind, JobKind::SyncWallet);
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.payload["walletAddress"], "W1");
    assert!(job.processed_at_ms.is_none());
    assert!(!job.cancel_requested);
}

#[test]
fn parse_record_reads_optional_fields() {
    let mut map = minimal_map("sync-wallet-abc");
    map.insert("state".to_string(), "completed".to_string());
    map.insert("processedAtMs".to_string(), "1000500".to_string());
    map.insert("finishedAtMs".to_string(), "1002000".to_string());
    map.insert("returnValue".to_string(), r#"{"synced":true}"#.to_string());
    map.insert("progress".to_string(), "100".to_string());
    map.insert("cancelRequested".to_string(), "1".to_string());

    let job = parse_record(&map).unwrap();
    assert_eq!(job.processed_at_ms, Some(1_000_500));
    assert_eq!(job.finished_at_ms, Some(1_002_000));
    assert_eq!(job.return_value.unwrap()["synced"], true);
    assert_eq!(job.progress, Some(ProgressValue::Percent(100)));
    assert!(job.cancel_requested);
}

#[test]
fn parse_record_rejects_unknown_kind() {
    let mut map = minimal_map("x");
    map.insert("kind".to_string(), "mine-bitcoin".to_string());
    let err = parse_record(&map).unwrap_err();
    assert!(matches!(err, BrokerError::Corrupt { .. }));
}

#[test]
fn parse_record_rejects_missing_field() {
    let mut map = minimal_map("x");
    map.remove("priority");
    let err = parse_record(&map).unwrap_err();
    assert!(err.to_string().contains("missing field priority"));
}

#[test]
fn parse_record_rejects_bad_payload_json() {
    let mut map = minimal_map("x");
    map.insert("payload".to_string(), "{not json".to_string());
    assert!(parse_record(&map).is_err());
}

#[test]
fn pairs_fold_into_a_map() {
    let flat = vec![
        "id".to_string(),
        "j1".to_string(),
        "state".to_string(),
        "active".to_string(),
    ];
    let map = pairs_to_map(flat);
    assert_eq!(map.get("id").map(String::as_str), Some("j1"));
    assert_eq!(map.get("state").map(String::as_str), Some("active"));
}

#[test]
fn key_shapes() {
    assert_eq!(job_key(&JobId::new("j1")), "job:j1");
    assert_eq!(queue_key(QueueName::AnalysisOperations, "waiting"), "queue:analysis-operations:waiting");
}
