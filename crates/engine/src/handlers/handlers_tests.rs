// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::analyzers::ScriptedAnalyzers;
use crate::progress::CollectingSink;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wq_broker::{EnqueueSpec, MemoryBroker, QueueAdapter};
use wq_core::test_support::dashboard_payload;
use wq_core::{
    derive_job_id, AnalysisScope, FakeClock, HolderProfilesPayload, JobId, JobState, QueueName,
};

struct Rig {
    handlers: Handlers<
        MemoryBroker<FakeClock>,
        MemoryBroker<FakeClock>,
        MemoryBroker<FakeClock>,
        FakeClock,
    >,
    broker: MemoryBroker<FakeClock>,
    clock: FakeClock,
    sink: CollectingSink,
    analyzers: ScriptedAnalyzers,
}

fn rig_with(analyzers: ScriptedAnalyzers) -> Rig {
    let clock = FakeClock::new();
    clock.set_epoch_ms(80_000_000);
    let broker = MemoryBroker::new(clock.clone());
    let handlers = Handlers::new(
        analyzers.set(),
        broker.clone(),
        broker.clone(),
        broker.clone(),
        clock.clone(),
    );
    Rig { handlers, broker, clock, sink: CollectingSink::new(), analyzers }
}

impl Rig {
    fn reporter(
        &self,
        id: &JobId,
        queue: QueueName,
    ) -> crate::progress::ProgressReporter<MemoryBroker<FakeClock>, CollectingSink, FakeClock>
    {
        crate::progress::ProgressReporter::new(
            self.broker.clone(),
            self.sink.clone(),
            self.clock.clone(),
            id.clone(),
            queue,
            CancellationToken::new(),
        )
    }

    async fn run_reserved(&self, queue: QueueName) -> Result<serde_json::Value, HandlerError> {
        let job = self.broker.reserve(queue, 30_000).await.unwrap().unwrap();
        let reporter = self.reporter(&job.id, queue);
        self.handlers.run(&job, &reporter).await
    }
}

#[tokio::test]
async fn dashboard_completion_persists_the_run_before_cascading() {
    let rig = rig_with(ScriptedAnalyzers::new());
    let mut payload = dashboard_payload("Wallet1", AnalysisScope::Flash);
    payload.queue_working_after = true;
    payload.queue_deep_after = true;
    let id = derive_job_id(
        wq_core::JobKind::DashboardWalletAnalysis,
        "Wallet1:flash",
        None,
    );
    rig.broker
        .add(EnqueueSpec::new(
            id,
            wq_core::JobKind::DashboardWalletAnalysis,
            serde_json::to_value(&payload).unwrap(),
        ))
        .await
        .unwrap();

    let value = rig.run_reserved(QueueName::AnalysisOperations).await.unwrap();
    assert_eq!(value["queuedFollowUpScopes"], json!(["working", "deep"]));

    // The run is persisted and gates freshness.
    let run = rig
        .broker
        .latest_completed("Wallet1", AnalysisScope::Flash)
        .await
        .unwrap()
        .expect("run persisted");
    assert_eq!(run.run_timestamp_ms, rig.clock.epoch_ms());

    // Working (priority 7) and deep (priority 5) are now waiting.
    let waiting = rig
        .broker
        .jobs_in_state(QueueName::AnalysisOperations, JobState::Waiting, 0, 10)
        .await
        .unwrap();
    let queued: Vec<(String, u8)> = waiting
        .iter()
        .map(|j| (j.payload["scope"].as_str().unwrap_or_default().to_string(), j.priority))
        .collect();
    assert_eq!(queued, vec![("working".to_string(), 7), ("deep".to_string(), 5)]);
    // Follow-ups must not re-cascade.
    assert!(waiting.iter().all(|j| j.payload["queueWorkingAfter"] == json!(false)));
}

#[tokio::test]
async fn dashboard_follow_up_is_idempotent_against_existing_jobs() {
    let rig = rig_with(ScriptedAnalyzers::new());
    // A deep job is already waiting.
    let deep = dashboard_payload("Wallet1", AnalysisScope::Deep);
    let deep_id =
        derive_job_id(wq_core::JobKind::DashboardWalletAnalysis, "Wallet1:deep", None);
    rig.broker
        .add(EnqueueSpec::new(
            deep_id,
            wq_core::JobKind::DashboardWalletAnalysis,
            serde_json::to_value(&deep).unwrap(),
        ))
        .await
        .unwrap();

    let mut flash = dashboard_payload("Wallet1", AnalysisScope::Flash);
    flash.queue_deep_after = true;
    let flash_id =
        derive_job_id(wq_core::JobKind::DashboardWalletAnalysis, "Wallet1:flash", None);
    rig.broker
        .add(EnqueueSpec::new(
            flash_id.clone(),
            wq_core::JobKind::DashboardWalletAnalysis,
            serde_json::to_value(&flash).unwrap(),
        ))
        .await
        .unwrap();

    // Flash pops first (it was enqueued second but... both normal
    // priority; deep was first in FIFO). Drain until we process flash.
    loop {
        let job = rig.broker.reserve(QueueName::AnalysisOperations, 30_000).await.unwrap();
        let Some(job) = job else { break };
        let reporter = rig.reporter(&job.id, QueueName::AnalysisOperations);
        let is_flash = job.id == flash_id;
        rig.handlers.run(&job, &reporter).await.unwrap();
        rig.broker.complete(&job.id, json!({})).await.unwrap();
        if is_flash {
            break;
        }
    }

    // Only one deep job exists in any state.
    let mut deep_count = 0;
    for state in [JobState::Waiting, JobState::Active, JobState::Completed] {
        deep_count += rig
            .broker
            .jobs_in_state(QueueName::AnalysisOperations, state, 0, 50)
            .await
            .unwrap()
            .iter()
            .filter(|j| j.payload["scope"] == json!("deep"))
            .count();
    }
    assert_eq!(deep_count, 1);
}

#[tokio::test]
async fn holder_profiles_token_misses_then_caches() {
    let rig = rig_with(ScriptedAnalyzers::new().with_profiles(&["WalletQ"]));
    let payload = HolderProfilesPayload::Token { token_mint: "MintX".to_string(), top_n: 10 };
    let id = derive_job_id(wq_core::JobKind::AnalyzeHolderProfiles, "MintX:10", None);
    rig.broker
        .add(EnqueueSpec::new(
            id,
            wq_core::JobKind::AnalyzeHolderProfiles,
            serde_json::to_value(&payload).unwrap(),
        ))
        .await
        .unwrap();

    let value = rig.run_reserved(QueueName::AnalysisOperations).await.unwrap();
    assert_eq!(value["cached"], json!(false));
    assert_eq!(value["profileCount"], json!(1));
    assert!(rig.broker.raw_cache_get("holder-profiles:token:MintX:10").is_some());
}

#[tokio::test]
async fn holder_profiles_serves_from_cache_without_recompute() {
    let rig = rig_with(ScriptedAnalyzers::new().with_profiles(&["WalletQ"]));
    // Warm the cache.
    let warm = HolderProfilesPayload::Token { token_mint: "MintX".to_string(), top_n: 10 };
    let warm_id = derive_job_id(wq_core::JobKind::AnalyzeHolderProfiles, "MintX:10", None);
    rig.broker
        .add(EnqueueSpec::new(
            warm_id.clone(),
            wq_core::JobKind::AnalyzeHolderProfiles,
            serde_json::to_value(&warm).unwrap(),
        ))
        .await
        .unwrap();
    rig.run_reserved(QueueName::AnalysisOperations).await.unwrap();
    rig.broker.complete(&warm_id, json!({})).await.unwrap();
    let calls_after_warm = rig.analyzers.calls();

    // Re-run the same target under a fresh job id.
    let again = derive_job_id(wq_core::JobKind::AnalyzeHolderProfiles, "MintX:10", Some("r2"));
    rig.broker
        .add(EnqueueSpec::new(
            again,
            wq_core::JobKind::AnalyzeHolderProfiles,
            serde_json::to_value(&warm).unwrap(),
        ))
        .await
        .unwrap();
    let value = rig.run_reserved(QueueName::AnalysisOperations).await.unwrap();

    assert_eq!(value["cached"], json!(true));
    assert_eq!(rig.analyzers.calls(), calls_after_warm);
}

#[tokio::test]
async fn sync_invalidates_holder_profiles_mentioning_the_wallet() {
    let rig = rig_with(ScriptedAnalyzers::new());
    // A cached token result that mentions the wallet we are syncing.
    rig.broker.insert_raw_cache(
        "holder-profiles:token:MintX:10",
        &json!({
            "profiles": [{ "walletAddress": "W1" }],
            "generatedAtMs": 1,
        })
        .to_string(),
        3_600_000,
    );

    let id = derive_job_id(wq_core::JobKind::SyncWallet, "W1", None);
    rig.broker
        .add(EnqueueSpec::new(id, wq_core::JobKind::SyncWallet, json!({ "walletAddress": "W1" })))
        .await
        .unwrap();
    rig.run_reserved(QueueName::WalletOperations).await.unwrap();

    assert!(rig.broker.raw_cache_get("holder-profiles:token:MintX:10").is_none());
}
