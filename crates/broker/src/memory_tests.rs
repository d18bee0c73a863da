// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::time::Duration;
use wq_core::{derive_job_id, FakeClock, HolderProfile, JobKind};

fn broker() -> (MemoryBroker<FakeClock>, FakeClock) {
    let clock = FakeClock::new();
    (MemoryBroker::new(clock.clone()), clock)
}

fn spec(kind: JobKind, key: &str) -> EnqueueSpec {
    EnqueueSpec::new(derive_job_id(kind, key, None), kind, json!({ "walletAddress": key }))
}

#[tokio::test]
async fn add_is_idempotent_for_nonterminal_jobs() {
    let (broker, _) = broker();
    let first = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap();
    assert!(!first.existed());

    let second = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap();
    assert!(second.existed());
    assert_eq!(second.job().id, first.job().id);

    let counts = broker.counts(QueueName::WalletOperations).await.unwrap();
    assert_eq!(counts.waiting, 1);
}

#[tokio::test]
async fn terminal_id_collision_returns_the_prior_job() {
    let (broker, _) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();
    broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().unwrap();
    assert!(broker.complete(&id, json!({ "ok": true })).await.unwrap());

    let replay = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap();
    assert!(matches!(replay, EnqueueOutcome::TerminalExists(_)));
    assert_eq!(replay.job().state, JobState::Completed);
}

#[tokio::test]
async fn reserve_pops_by_priority_then_fifo() {
    let (broker, _) = broker();
    let low = spec(JobKind::AnalyzePnl, "W-low");
    let first_normal = spec(JobKind::AnalyzeBehavior, "W-a");
    let second_normal = spec(JobKind::AnalyzePnl, "W-b");
    let critical = spec(JobKind::DashboardWalletAnalysis, "W-hot").priority(10);

    broker.add(low.priority(3)).await.unwrap();
    broker.add(first_normal.priority(5)).await.unwrap();
    broker.add(second_normal.priority(5)).await.unwrap();
    broker.add(critical).await.unwrap();

    let mut order = Vec::new();
    for _ in 0..4 {
        let job = broker.reserve(QueueName::AnalysisOperations, 30_000).await.unwrap().unwrap();
        order.push(job.payload["walletAddress"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(order, vec!["W-hot", "W-a", "W-b", "W-low"]);
}

#[tokio::test]
async fn reserve_consumes_an_attempt_and_sets_processed_at() {
    let (broker, clock) = broker();
    clock.set_epoch_ms(5_000_000);
    broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap();
    clock.advance(Duration::from_millis(750));

    let job = broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Active);
    assert_eq!(job.attempts_made, 1);
    assert_eq!(job.processed_at_ms, Some(5_000_750));
    assert_eq!(job.created_at_ms, 5_000_000);
}

#[tokio::test]
async fn paused_queues_do_not_dispatch() {
    let (broker, _) = broker();
    broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap();
    broker.set_paused(QueueName::WalletOperations, true).await.unwrap();
    assert!(broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().is_none());

    broker.set_paused(QueueName::WalletOperations, false).await.unwrap();
    assert!(broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().is_some());
}

#[tokio::test]
async fn delayed_jobs_promote_when_due() {
    let (broker, clock) = broker();
    broker.add(spec(JobKind::SyncWallet, "W1").delay_ms(5_000)).await.unwrap();

    assert!(broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().is_none());
    clock.advance(Duration::from_secs(5));
    let job = broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Active);
}

#[tokio::test]
async fn complete_is_exactly_once() {
    let (broker, _) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();
    broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().unwrap();

    assert!(broker.complete(&id, json!(1)).await.unwrap());
    // The second terminal transition must be refused.
    assert!(!broker.complete(&id, json!(2)).await.unwrap());
    assert_eq!(broker.get_job(&id).await.unwrap().unwrap().return_value, Some(json!(1)));
}

#[tokio::test]
async fn fail_retries_until_attempts_exhaust() {
    let (broker, clock) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();

    for attempt in 1..=3u32 {
        let job = broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap().unwrap();
        assert_eq!(job.attempts_made, attempt);
        let outcome = broker.fail(&id, "rpc window closed", Some(2_000)).await.unwrap();
        if attempt < 3 {
            assert_eq!(outcome, FailOutcome::Retried { attempts_made: attempt });
            clock.advance(Duration::from_secs(2));
        } else {
            assert_eq!(outcome, FailOutcome::Failed { attempts_made: 3 });
        }
    }

    let job = broker.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.failed_reason.as_deref(), Some("rpc window closed"));
}

#[tokio::test]
async fn permanent_failures_skip_the_retry_budget() {
    let (broker, _) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();
    broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap();

    let outcome = broker.fail(&id, "unknown kind", None).await.unwrap();
    assert_eq!(outcome, FailOutcome::Failed { attempts_made: 1 });
}

#[tokio::test]
async fn remove_waiting_job_deletes_it() {
    let (broker, _) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();
    assert_eq!(broker.remove(&id).await.unwrap(), RemoveOutcome::Removed);
    assert!(broker.get_job(&id).await.unwrap().is_none());
    assert_eq!(broker.counts(QueueName::WalletOperations).await.unwrap().waiting, 0);
}

#[tokio::test]
async fn remove_active_job_requests_abort() {
    let (broker, _) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();
    broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap();

    assert_eq!(broker.remove(&id).await.unwrap(), RemoveOutcome::AbortRequested);
    // The worker observes it at the next checkpoint.
    let cancel = broker.update_progress(&id, &ProgressValue::Percent(50)).await.unwrap();
    assert!(cancel);
    let lease = broker.heartbeat(&id, 30_000).await.unwrap();
    assert!(lease.cancel_requested);
}

#[tokio::test]
async fn stalled_jobs_requeue_then_fail_past_the_limit() {
    let (broker, clock) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();

    // Stall once: lease expires, job goes back to waiting without
    // consuming an attempt.
    broker.reserve(QueueName::WalletOperations, 1_000).await.unwrap();
    clock.advance(Duration::from_secs(2));
    let sweep = broker.requeue_stalled(QueueName::WalletOperations, 1).await.unwrap();
    assert_eq!(sweep.requeued, vec![id.clone()]);
    assert_eq!(broker.get_job(&id).await.unwrap().unwrap().attempts_made, 0);

    // Stall again: past max_stalled, the job fails.
    broker.reserve(QueueName::WalletOperations, 1_000).await.unwrap();
    clock.advance(Duration::from_secs(2));
    let sweep = broker.requeue_stalled(QueueName::WalletOperations, 1).await.unwrap();
    assert_eq!(sweep.failed, vec![id.clone()]);
    let job = broker.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.failed_reason.unwrap().contains("stalled"));
}

#[tokio::test]
async fn heartbeat_extends_the_lease() {
    let (broker, clock) = broker();
    let id = broker.add(spec(JobKind::SyncWallet, "W1")).await.unwrap().job().id.clone();
    broker.reserve(QueueName::WalletOperations, 1_000).await.unwrap();

    clock.advance(Duration::from_millis(900));
    assert!(broker.heartbeat(&id, 1_000).await.unwrap().alive);
    clock.advance(Duration::from_millis(900));
    // Still alive because the heartbeat re-armed the lease.
    let sweep = broker.requeue_stalled(QueueName::WalletOperations, 1).await.unwrap();
    assert!(sweep.requeued.is_empty() && sweep.failed.is_empty());
}

#[tokio::test]
async fn clean_respects_grace_and_keep() {
    let (broker, clock) = broker();
    let mut ids = Vec::new();
    for n in 0..4 {
        let id = broker
            .add(spec(JobKind::SyncWallet, &format!("W{n}")))
            .await
            .unwrap()
            .job()
            .id
            .clone();
        broker.reserve(QueueName::WalletOperations, 30_000).await.unwrap();
        broker.complete(&id, json!(n)).await.unwrap();
        ids.push(id);
        clock.advance(Duration::from_secs(60));
    }

    // Everything is older than 30s except the newest; keep 1 regardless.
    let removed =
        broker.clean(QueueName::WalletOperations, 30_000, 1, JobState::Completed).await.unwrap();
    assert_eq!(removed, 3);
    assert!(broker.get_job(&ids[3]).await.unwrap().is_some());
    assert!(broker.get_job(&ids[0]).await.unwrap().is_none());
}

#[tokio::test]
async fn jobs_in_state_pages_in_dispatch_order() {
    let (broker, _) = broker();
    broker.add(spec(JobKind::AnalyzePnl, "W-a").priority(5)).await.unwrap();
    broker.add(spec(JobKind::AnalyzePnl, "W-b").priority(10)).await.unwrap();
    broker.add(spec(JobKind::AnalyzePnl, "W-c").priority(5)).await.unwrap();

    let waiting = broker
        .jobs_in_state(QueueName::AnalysisOperations, JobState::Waiting, 0, 10)
        .await
        .unwrap();
    let keys: Vec<&str> =
        waiting.iter().map(|j| j.payload["walletAddress"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["W-b", "W-a", "W-c"]);
}

// ── Locks ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn lock_exclusivity() {
    let (broker, _) = broker();
    assert!(broker.acquire("lock:wallet:sync:W1", "job-1", 60_000).await.unwrap());
    assert!(!broker.acquire("lock:wallet:sync:W1", "job-2", 60_000).await.unwrap());
    assert!(broker.check("lock:wallet:sync:W1", Some("job-1")).await.unwrap());
    assert!(!broker.check("lock:wallet:sync:W1", Some("job-2")).await.unwrap());
}

#[tokio::test]
async fn lock_release_is_owner_checked() {
    let (broker, _) = broker();
    broker.acquire("lock:wallet:sync:W1", "job-1", 60_000).await.unwrap();
    assert!(!broker.release("lock:wallet:sync:W1", "job-2").await.unwrap());
    assert!(broker.check("lock:wallet:sync:W1", None).await.unwrap());
    assert!(broker.release("lock:wallet:sync:W1", "job-1").await.unwrap());
    assert!(!broker.check("lock:wallet:sync:W1", None).await.unwrap());
}

#[tokio::test]
async fn lock_ttl_expires_and_frees_the_key() {
    let (broker, clock) = broker();
    broker.acquire("lock:wallet:pnl:W1", "job-1", 1_000).await.unwrap();
    assert!(broker.ttl_ms("lock:wallet:pnl:W1").await.unwrap().unwrap() <= 1_000);

    clock.advance(Duration::from_secs(2));
    assert!(!broker.check("lock:wallet:pnl:W1", None).await.unwrap());
    // A new owner can take over; the dead owner cannot release it.
    assert!(broker.acquire("lock:wallet:pnl:W1", "job-2", 1_000).await.unwrap());
    assert!(!broker.release("lock:wallet:pnl:W1", "job-1").await.unwrap());
}

#[tokio::test]
async fn force_release_ignores_ownership() {
    let (broker, _) = broker();
    broker.acquire("lock:similarity:req-1", "job-1", 60_000).await.unwrap();
    assert!(broker.force_release("lock:similarity:req-1").await.unwrap());
    assert!(!broker.check("lock:similarity:req-1", None).await.unwrap());
}

#[tokio::test]
async fn extend_rearms_only_for_the_owner() {
    let (broker, clock) = broker();
    broker.acquire("lock:wallet:sync:W1", "job-1", 1_000).await.unwrap();
    assert!(!broker.extend("lock:wallet:sync:W1", "job-2", 10_000).await.unwrap());
    assert!(broker.extend("lock:wallet:sync:W1", "job-1", 10_000).await.unwrap());
    clock.advance(Duration::from_secs(5));
    assert!(broker.check("lock:wallet:sync:W1", Some("job-1")).await.unwrap());
}

// ── Cache ───────────────────────────────────────────────────────────────

fn result_with(wallets: &[&str]) -> HolderProfilesResult {
    HolderProfilesResult {
        profiles: wallets
            .iter()
            .map(|w| HolderProfile {
                wallet_address: w.to_string(),
                metrics: serde_json::Map::new(),
            })
            .collect(),
        token_mint: Some("MintX".to_string()),
        generated_at_ms: 1_000_000,
    }
}

#[tokio::test]
async fn cache_round_trip_and_expiry() {
    let (broker, clock) = broker();
    broker.cache_token("MintX", 10, &result_with(&["WalletQ"])).await.unwrap();
    assert!(broker.get_token("MintX", 10).await.unwrap().is_some());

    clock.advance(Duration::from_secs(3601));
    assert!(broker.get_token("MintX", 10).await.unwrap().is_none());
}

#[tokio::test]
async fn invalidate_for_wallet_is_membership_checked() {
    let (broker, _) = broker();
    broker.cache_token("MintX", 10, &result_with(&["WalletQ", "WalletR"])).await.unwrap();
    broker.cache_token("MintY", 5, &result_with(&["WalletR"])).await.unwrap();
    broker.cache_wallet("WalletQ", &result_with(&["WalletQ"])).await.unwrap();

    let removed = broker.invalidate_for_wallet("WalletQ").await.unwrap();
    assert_eq!(removed, 2);
    assert!(broker.get_token("MintX", 10).await.unwrap().is_none());
    assert!(broker.get_wallet("WalletQ").await.unwrap().is_none());
    // MintY never contained WalletQ and survives.
    assert!(broker.get_token("MintY", 5).await.unwrap().is_some());
}

#[tokio::test]
async fn invalidate_for_wallet_deletes_corrupt_entries() {
    let (broker, _) = broker();
    broker.insert_raw_cache("holder-profiles:token:MintZ:10", "{not json", 60_000);
    let removed = broker.invalidate_for_wallet("WalletQ").await.unwrap();
    assert_eq!(removed, 1);
    assert!(broker.raw_cache_get("holder-profiles:token:MintZ:10").is_none());
}

#[tokio::test]
async fn invalidate_for_token_drops_every_top_n_variant() {
    let (broker, _) = broker();
    broker.cache_token("MintX", 10, &result_with(&["WalletQ"])).await.unwrap();
    broker.cache_token("MintX", 25, &result_with(&["WalletQ"])).await.unwrap();
    broker.cache_token("MintY", 10, &result_with(&["WalletQ"])).await.unwrap();

    assert_eq!(broker.invalidate_for_token("MintX").await.unwrap(), 2);
    assert!(broker.get_token("MintY", 10).await.unwrap().is_some());
}

// ── Runs ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn run_store_keeps_latest_completed_per_scope() {
    let (broker, _) = broker();
    let run = AnalysisRun {
        wallet_address: "Wallet2".to_string(),
        scope: AnalysisScope::Working,
        run_timestamp_ms: 1_000_000,
        status: RunStatus::Completed,
    };
    broker.record_run(&run).await.unwrap();

    let found = broker.latest_completed("Wallet2", AnalysisScope::Working).await.unwrap();
    assert_eq!(found, Some(run));
    assert!(broker.latest_completed("Wallet2", AnalysisScope::Deep).await.unwrap().is_none());

    // A failed run does not gate freshness.
    let failed = AnalysisRun {
        wallet_address: "Wallet2".to_string(),
        scope: AnalysisScope::Working,
        run_timestamp_ms: 2_000_000,
        status: RunStatus::Failed,
    };
    broker.record_run(&failed).await.unwrap();
    assert!(broker.latest_completed("Wallet2", AnalysisScope::Working).await.unwrap().is_none());
}
