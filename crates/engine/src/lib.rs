// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wq-engine: dispatcher, scope controller, worker pool, and the
//! progress bus publish side.

pub mod analyzers;
pub mod dispatch;
pub mod handlers;
pub mod progress;
pub mod scope;
pub mod validate;
pub mod worker;

pub use analyzers::{
    AnalyzerError, AnalyzerErrorKind, AnalyzerSet, BalanceEnricher, BehaviorAnalyzer,
    DashboardAnalyzer, HolderProfiler, PnlAnalyzer, SimilarityEngine, WalletSyncer,
};
#[cfg(any(test, feature = "test-support"))]
pub use analyzers::ScriptedAnalyzers;
pub use dispatch::{DispatchError, DispatchReceipt, DispatchStatus, Dispatcher};
pub use handlers::{HandlerError, Handlers};
#[cfg(any(test, feature = "test-support"))]
pub use progress::CollectingSink;
pub use progress::{Aborted, NullSink, ProgressBus, ProgressProbe, ProgressReporter, ProgressSink};
pub use scope::DashboardRequest;
pub use worker::{WorkerOptions, WorkerPool};
