// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::job::{JobKind, QueueName};
use crate::payload::DashboardAnalysisPayload;
use crate::scope::AnalysisScope;

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for core domain types.
pub mod strategies {
    use super::*;
    use proptest::prelude::*;

    /// A plausible base58 Solana address (32..44 chars of the base58 alphabet).
    pub fn arb_address() -> impl Strategy<Value = String> {
        proptest::string::string_regex("[1-9A-HJ-NP-Za-km-z]{32,44}")
            .unwrap_or_else(|_| unreachable!("valid regex"))
    }

    pub fn arb_kind() -> impl Strategy<Value = JobKind> {
        proptest::sample::select(JobKind::ALL.to_vec())
    }

    pub fn arb_queue() -> impl Strategy<Value = QueueName> {
        proptest::sample::select(QueueName::ALL.to_vec())
    }

    pub fn arb_scope() -> impl Strategy<Value = AnalysisScope> {
        proptest::sample::select(AnalysisScope::ALL.to_vec())
    }
}

// ── Payload factory functions ───────────────────────────────────────────

/// A resolved dashboard payload with sane defaults for tests.
pub fn dashboard_payload(wallet: &str, scope: AnalysisScope) -> DashboardAnalysisPayload {
    let defaults = scope.defaults();
    DashboardAnalysisPayload {
        wallet_address: wallet.to_string(),
        scope,
        history_window_days: defaults.history_window_days,
        target_signature_count: defaults.target_signature_count,
        force_refresh: false,
        enrich_metadata: false,
        queue_working_after: false,
        queue_deep_after: false,
        timeout_minutes: defaults.timeout_minutes,
        trigger_source: Some("test".to_string()),
        request_id: "req-test".to_string(),
    }
}
