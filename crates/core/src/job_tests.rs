// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn job_id_display() {
    let id = JobId::new("sync-wallet-abc123");
    assert_eq!(id.to_string(), "sync-wallet-abc123");
}

#[test]
fn job_id_from_str() {
    let id: JobId = "test".into();
    assert_eq!(id.as_str(), "test");
}

#[test]
fn job_id_serde_is_transparent() {
    let id = JobId::new("my-job");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"my-job\"");

    let parsed: JobId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[parameterized(
    sync = { JobKind::SyncWallet, "sync-wallet", QueueName::WalletOperations },
    pnl = { JobKind::AnalyzePnl, "analyze-pnl", QueueName::AnalysisOperations },
    behavior = { JobKind::AnalyzeBehavior, "analyze-behavior", QueueName::AnalysisOperations },
    dashboard = { JobKind::DashboardWalletAnalysis, "dashboard-wallet-analysis", QueueName::AnalysisOperations },
    similarity = { JobKind::SimilarityAnalysisFlow, "similarity-analysis-flow", QueueName::SimilarityOperations },
    enrich = { JobKind::EnrichTokenBalances, "enrich-token-balances", QueueName::EnrichmentOperations },
    holders = { JobKind::AnalyzeHolderProfiles, "analyze-holder-profiles", QueueName::AnalysisOperations },
)]
fn kind_name_and_routing(kind: JobKind, name: &str, queue: QueueName) {
    assert_eq!(kind.as_str(), name);
    assert_eq!(kind.queue(), queue);
    assert_eq!(name.parse::<JobKind>().unwrap(), kind);
}

#[test]
fn kind_serde_matches_as_str() {
    for kind in JobKind::ALL {
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(json, format!("\"{}\"", kind.as_str()));
    }
}

#[test]
fn unknown_kind_is_rejected() {
    let err = "mine-bitcoin".parse::<JobKind>().unwrap_err();
    assert_eq!(err.to_string(), "unknown job kind: mine-bitcoin");
}

#[parameterized(
    sync = { JobKind::SyncWallet, Some("lock:wallet:sync:W1") },
    pnl = { JobKind::AnalyzePnl, Some("lock:wallet:pnl:W1") },
    behavior = { JobKind::AnalyzeBehavior, Some("lock:wallet:behavior:W1") },
    dashboard = { JobKind::DashboardWalletAnalysis, Some("lock:wallet:dashboard-analysis:W1") },
    similarity = { JobKind::SimilarityAnalysisFlow, Some("lock:similarity:W1") },
    enrich = { JobKind::EnrichTokenBalances, None },
    holders = { JobKind::AnalyzeHolderProfiles, None },
)]
fn single_flight_lock_keys(kind: JobKind, expected: Option<&str>) {
    assert_eq!(kind.lock_key("W1").as_deref(), expected);
}

#[test]
fn queue_parse_round_trip() {
    for queue in QueueName::ALL {
        assert_eq!(queue.as_str().parse::<QueueName>().unwrap(), queue);
    }
    assert!("no-such-queue".parse::<QueueName>().is_err());
}

#[test]
fn queue_settings_match_operational_table() {
    let analysis = QueueName::AnalysisOperations.settings();
    assert_eq!(analysis.concurrency, 10);
    assert_eq!(analysis.attempts, 3);
    assert_eq!(analysis.max_stalled, 3);
    assert_eq!(
        analysis.backoff,
        BackoffPolicy::Exponential { base: Duration::from_secs(3) }
    );

    let similarity = QueueName::SimilarityOperations.settings();
    assert_eq!(similarity.concurrency, 2);

    let enrichment = QueueName::EnrichmentOperations.settings();
    assert_eq!(enrichment.backoff, BackoffPolicy::Fixed { delay: Duration::from_secs(2) });
}

#[parameterized(
    first = { 1, 2 },
    second = { 2, 4 },
    third = { 3, 8 },
)]
fn exponential_backoff_doubles(attempt: u32, expected_secs: u64) {
    let policy = BackoffPolicy::Exponential { base: Duration::from_secs(2) };
    assert_eq!(policy.delay_for(attempt), Duration::from_secs(expected_secs));
}

#[test]
fn fixed_backoff_is_constant() {
    let policy = BackoffPolicy::Fixed { delay: Duration::from_secs(2) };
    assert_eq!(policy.delay_for(1), Duration::from_secs(2));
    assert_eq!(policy.delay_for(7), Duration::from_secs(2));
}

#[test]
fn exponential_backoff_caps_exponent() {
    let policy = BackoffPolicy::Exponential { base: Duration::from_millis(1) };
    // Does not overflow for absurd attempt counts.
    assert_eq!(policy.delay_for(10_000), policy.delay_for(17));
}

#[test]
fn terminal_states() {
    assert!(JobState::Completed.is_terminal());
    assert!(JobState::Failed.is_terminal());
    assert!(!JobState::Waiting.is_terminal());
    assert!(!JobState::Active.is_terminal());
    assert!(!JobState::Delayed.is_terminal());
    assert!(!JobState::Paused.is_terminal());
}

#[test]
fn priority_values() {
    assert_eq!(Priority::Critical.value(), 10);
    assert_eq!(Priority::High.value(), 7);
    assert_eq!(Priority::Normal.value(), 5);
    assert_eq!(Priority::Low.value(), 3);
}

#[test]
fn enrich_defaults_to_low_priority() {
    assert_eq!(JobKind::EnrichTokenBalances.default_priority(), Priority::Low);
    assert_eq!(JobKind::SyncWallet.default_priority(), Priority::Normal);
}

#[test]
fn record_builder_defaults_are_waiting() {
    let job = JobRecord::builder().build();
    assert_eq!(job.state, JobState::Waiting);
    assert_eq!(job.attempts_made, 0);
    assert!(!job.is_terminal());
}

#[test]
fn record_serde_round_trip() {
    let job = JobRecord::builder()
        .id("analyze-pnl-00ff00ff00ff00ff")
        .kind(JobKind::AnalyzePnl)
        .queue(QueueName::AnalysisOperations)
        .state(JobState::Completed)
        .finished_at_ms(2_000_000u64)
        .return_value(serde_json::json!({ "realizedPnl": 12.5 }))
        .build();

    let json = serde_json::to_string(&job).unwrap();
    let parsed: JobRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, job);
    assert!(parsed.is_terminal());
}

#[test]
fn timeout_env_vars_match_config_surface() {
    assert_eq!(JobKind::SyncWallet.timeout_env_var(), "SYNC_WALLET_TIMEOUT_MS");
    assert_eq!(
        JobKind::SimilarityAnalysisFlow.timeout_env_var(),
        "CALCULATE_SIMILARITY_TIMEOUT_MS"
    );
    assert_eq!(
        JobKind::DashboardWalletAnalysis.timeout_env_var(),
        "DASHBOARD_WALLET_ANALYSIS_TIMEOUT_MS"
    );
}
