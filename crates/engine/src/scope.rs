// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard scope controller decisions.
//!
//! Pure decision logic for the scope state machine: resolving request
//! defaults, the freshness gate, in-flight dedup matching, and follow-up
//! planning. The dispatcher executes these decisions against the broker.

use wq_core::{AnalysisRun, AnalysisScope, DashboardAnalysisPayload, JobKind, JobRecord};

/// An intake request for a dashboard analysis, before defaults resolve.
#[derive(Debug, Clone, Default)]
pub struct DashboardRequest {
    pub wallet_address: String,
    pub analysis_scope: Option<AnalysisScope>,
    pub trigger_source: Option<String>,
    pub history_window_days: Option<u32>,
    pub target_signature_count: Option<u32>,
    pub force_refresh: bool,
    pub enrich_metadata: bool,
    pub queue_working_after: bool,
    pub queue_deep_after: bool,
    pub timeout_minutes: Option<u64>,
}

impl DashboardRequest {
    pub fn new(wallet_address: impl Into<String>) -> Self {
        Self { wallet_address: wallet_address.into(), ..Self::default() }
    }

    wq_core::setters! {
        set {
            analysis_scope: Option<AnalysisScope>,
            force_refresh: bool,
            enrich_metadata: bool,
            queue_working_after: bool,
            queue_deep_after: bool,
        }
        option {
            trigger_source: String,
            history_window_days: u32,
            target_signature_count: u32,
            timeout_minutes: u64,
        }
    }
}

/// Resolve a request into a fully-specified payload: scope defaults fill
/// the gaps, and the deep scope drops the history window entirely.
pub fn resolve_payload(req: &DashboardRequest, request_id: String) -> DashboardAnalysisPayload {
    let scope = req.analysis_scope.unwrap_or(AnalysisScope::Flash);
    let defaults = scope.defaults();
    let history_window_days = match scope {
        AnalysisScope::Deep => None,
        _ => req.history_window_days.or(defaults.history_window_days),
    };
    DashboardAnalysisPayload {
        wallet_address: req.wallet_address.clone(),
        scope,
        history_window_days,
        target_signature_count: req
            .target_signature_count
            .or(defaults.target_signature_count),
        force_refresh: req.force_refresh,
        enrich_metadata: req.enrich_metadata,
        queue_working_after: req.queue_working_after,
        queue_deep_after: req.queue_deep_after,
        timeout_minutes: req.timeout_minutes.unwrap_or(defaults.timeout_minutes),
        trigger_source: req.trigger_source.clone(),
        request_id,
    }
}

/// Freshness gate: a completed run younger than the scope's freshness
/// window suppresses a new one, unless the caller forces a refresh.
/// Returns the skip reason when the request should be skipped.
pub fn freshness_skip(
    now_ms: u64,
    scope: AnalysisScope,
    last_run: Option<&AnalysisRun>,
    force_refresh: bool,
) -> Option<String> {
    if force_refresh {
        return None;
    }
    let run = last_run?;
    let freshness_minutes = scope.defaults().freshness_minutes;
    let age_ms = now_ms.saturating_sub(run.run_timestamp_ms);
    if age_ms < freshness_minutes * 60_000 {
        Some(format!("fresh-within-{freshness_minutes}m"))
    } else {
        None
    }
}

/// In-flight dedup: find a non-terminal dashboard job for the same
/// (wallet, scope) among the queue's jobs.
pub fn find_in_flight<'a>(
    jobs: &'a [JobRecord],
    wallet: &str,
    scope: AnalysisScope,
) -> Option<&'a JobRecord> {
    jobs.iter().find(|job| {
        job.kind == JobKind::DashboardWalletAnalysis
            && !job.is_terminal()
            && job.payload["walletAddress"].as_str() == Some(wallet)
            && job.payload["scope"].as_str() == Some(scope.as_str())
    })
}

/// Build the follow-up requests a completing scope cascades into.
///
/// A completing flash run enqueues every scope its flags asked for
/// (`queueWorkingAfter` → working, `queueDeepAfter` → deep); a working
/// run enqueues deep when flagged. The follow-ups themselves carry no
/// cascade flags, so the chain terminates.
pub fn follow_up_requests(payload: &DashboardAnalysisPayload) -> Vec<DashboardRequest> {
    payload
        .follow_up_scopes()
        .into_iter()
        .map(|next| DashboardRequest {
            wallet_address: payload.wallet_address.clone(),
            analysis_scope: Some(next),
            trigger_source: Some(format!("cascade:{}", payload.scope)),
            history_window_days: None,
            target_signature_count: None,
            force_refresh: false,
            enrich_metadata: payload.enrich_metadata,
            queue_working_after: false,
            queue_deep_after: false,
            timeout_minutes: None,
        })
        .collect()
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
