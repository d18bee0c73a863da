// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wq-core: domain types for the walletq job orchestration core

pub mod macros;

pub mod clock;
pub mod event;
pub mod job;
pub mod jobid;
pub mod payload;
pub mod progress;
pub mod scope;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use event::{ProgressEvent, ProgressEventKind};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobRecordBuilder;
pub use job::{
    BackoffPolicy, JobId, JobKind, JobRecord, JobState, Priority, QueueName, QueueSettings,
    UnknownName,
};
pub use jobid::{derive_job_id, RequestId};
pub use payload::{
    AnalyzeBehaviorPayload, AnalyzePnlPayload, DashboardAnalysisPayload,
    EnrichTokenBalancesPayload, HolderProfile, HolderProfilesPayload, HolderProfilesResult,
    SimilarityFlowPayload, SyncWalletPayload, TokenBalance, VectorType, WalletBalances,
};
pub use progress::ProgressValue;
pub use scope::{AnalysisRun, AnalysisScope, RunStatus, ScopeDefaults};
