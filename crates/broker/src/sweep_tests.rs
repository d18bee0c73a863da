// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::adapter::EnqueueSpec;
use crate::memory::MemoryBroker;
use serde_json::json;
use wq_core::{derive_job_id, FakeClock, JobKind};
use yare::parameterized;

#[parameterized(
    sync = { "lock:wallet:sync:W1", Some(QueueName::WalletOperations) },
    pnl = { "lock:wallet:pnl:W1", Some(QueueName::AnalysisOperations) },
    behavior = { "lock:wallet:behavior:W1", Some(QueueName::AnalysisOperations) },
    dashboard = { "lock:wallet:dashboard-analysis:W1", Some(QueueName::AnalysisOperations) },
    similarity = { "lock:similarity:req-1", Some(QueueName::SimilarityOperations) },
    not_a_lock = { "holder-profiles:wallet:W1", None },
    unknown_domain = { "lock:token:enrich:MintX", None },
    missing_key = { "lock:wallet", None },
)]
fn implied_queue_parses_key_shapes(key: &str, expected: Option<QueueName>) {
    assert_eq!(implied_queue(key), expected);
}

#[tokio::test]
async fn sweep_releases_locks_with_absent_owners() {
    let broker = MemoryBroker::new(FakeClock::new());
    broker.plant_lock("lock:wallet:dashboard-analysis:WalletR", "job-123", 600_000);

    let report = sweep_orphan_locks(&broker, &broker).await.unwrap();
    assert_eq!(report.released, vec!["lock:wallet:dashboard-analysis:WalletR".to_string()]);
    assert!(!broker.check("lock:wallet:dashboard-analysis:WalletR", None).await.unwrap());
}

#[tokio::test]
async fn sweep_releases_locks_with_terminal_owners() {
    let broker = MemoryBroker::new(FakeClock::new());
    let id = derive_job_id(JobKind::AnalyzePnl, "W1", None);
    broker
        .add(EnqueueSpec::new(id.clone(), JobKind::AnalyzePnl, json!({ "walletAddress": "W1" })))
        .await
        .unwrap();
    broker.reserve(QueueName::AnalysisOperations, 30_000).await.unwrap();
    broker.complete(&id, json!({})).await.unwrap();
    broker.plant_lock("lock:wallet:pnl:W1", id.as_str(), 600_000);

    let report = sweep_orphan_locks(&broker, &broker).await.unwrap();
    assert_eq!(report.released.len(), 1);
}

#[tokio::test]
async fn sweep_leaves_locks_with_active_owners() {
    let broker = MemoryBroker::new(FakeClock::new());
    let id = derive_job_id(JobKind::SyncWallet, "W1", None);
    broker
        .add(EnqueueSpec::new(id.clone(), JobKind::SyncWallet, json!({ "walletAddress": "W1" })))
        .await
        .unwrap();
    broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap();
    broker.plant_lock("lock:wallet:sync:W1", id.as_str(), 600_000);

    let report = sweep_orphan_locks(&broker, &broker).await.unwrap();
    assert!(report.released.is_empty());
    assert!(broker.check("lock:wallet:sync:W1", None).await.unwrap());
}

#[tokio::test]
async fn sweep_leaves_locks_with_waiting_owners() {
    let broker = MemoryBroker::new(FakeClock::new());
    let id = derive_job_id(JobKind::SyncWallet, "W1", None);
    broker
        .add(EnqueueSpec::new(id.clone(), JobKind::SyncWallet, json!({ "walletAddress": "W1" })))
        .await
        .unwrap();
    broker.plant_lock("lock:wallet:sync:W1", id.as_str(), 600_000);

    let report = sweep_orphan_locks(&broker, &broker).await.unwrap();
    assert!(report.released.is_empty());
}

#[tokio::test]
async fn sweep_skips_unrecognized_keys() {
    let broker = MemoryBroker::new(FakeClock::new());
    broker.plant_lock("lock:mystery:thing:x", "job-9", 600_000);

    let report = sweep_orphan_locks(&broker, &broker).await.unwrap();
    assert!(report.released.is_empty());
    assert_eq!(report.skipped, vec!["lock:mystery:thing:x".to_string()]);
    assert!(broker.check("lock:mystery:thing:x", None).await.unwrap());
}
