// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use wq_core::JobRecordBuilder;

#[test]
fn queue_job_response_omits_empty_flags() {
    let response = QueueJobResponse {
        job_id: Some("sync-wallet-00ff".to_string()),
        request_id: "req-1".to_string(),
        status: "queued".to_string(),
        queue_name: "wallet-operations".to_string(),
        analysis_scope: None,
        estimated_processing_time: None,
        monitoring_url: Some("/jobs/sync-wallet-00ff".to_string()),
        skipped: false,
        skip_reason: None,
        queued_follow_up_scopes: Vec::new(),
        already_running: false,
        wallet_count: None,
        token_count: None,
    };
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["jobId"], "sync-wallet-00ff");
    assert!(value.get("skipped").is_none());
    assert!(value.get("alreadyRunning").is_none());
    assert!(value.get("analysisScope").is_none());
    assert_eq!(value["queuedFollowUpScopes"], json!([]));
}

#[test]
fn skipped_response_carries_the_reason() {
    let response = QueueJobResponse {
        job_id: None,
        request_id: "req-2".to_string(),
        status: "skipped".to_string(),
        queue_name: "analysis-operations".to_string(),
        analysis_scope: Some("working".to_string()),
        estimated_processing_time: None,
        monitoring_url: None,
        skipped: true,
        skip_reason: Some("fresh-within-10m".to_string()),
        queued_follow_up_scopes: Vec::new(),
        already_running: false,
        wallet_count: None,
        token_count: None,
    };
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["jobId"], json!(null));
    assert_eq!(value["skipped"], json!(true));
    assert_eq!(value["skipReason"], "fresh-within-10m");
}

#[test]
fn job_detail_maps_from_a_record() {
    let job = JobRecordBuilder::default()
        .id("analyze-pnl-0011223344556677")
        .kind(wq_core::JobKind::AnalyzePnl)
        .queue(wq_core::QueueName::AnalysisOperations)
        .state(wq_core::JobState::Active)
        .processed_at_ms(2_000u64)
        .build();

    let detail = JobDetail::from(&job);
    assert_eq!(detail.job_id, "analyze-pnl-0011223344556677");
    assert_eq!(detail.kind, "analyze-pnl");
    assert_eq!(detail.status, "active");
    assert_eq!(detail.processed_at_ms, Some(2_000));

    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(value["queueName"], "analysis-operations");
    assert!(value.get("failedReason").is_none());
}

#[test]
fn error_bodies_use_the_taxonomy_slugs() {
    assert_eq!(ErrorBody::invalid_input("x").error, "invalid-input");
    assert_eq!(ErrorBody::not_found("x").error, "not-found");
    assert_eq!(ErrorBody::infra_unavailable("x").error, "infra-unavailable");
}
