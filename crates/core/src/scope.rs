// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard analysis scopes and their per-scope defaults.

use crate::job::Priority;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Breadth of a dashboard analysis run.
///
/// `flash` covers the latest slice of activity, `working` a recent window,
/// `deep` the entire history. A completed scope may cascade into the next
/// one via the follow-up flags on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisScope {
    Flash,
    Working,
    Deep,
}

impl AnalysisScope {
    pub const ALL: [AnalysisScope; 3] =
        [AnalysisScope::Flash, AnalysisScope::Working, AnalysisScope::Deep];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisScope::Flash => "flash",
            AnalysisScope::Working => "working",
            AnalysisScope::Deep => "deep",
        }
    }

    /// Queue priority for this scope: flash preempts everything, deep
    /// yields to interactive work.
    pub fn priority(&self) -> Priority {
        match self {
            AnalysisScope::Flash => Priority::Critical,
            AnalysisScope::Working => Priority::High,
            AnalysisScope::Deep => Priority::Normal,
        }
    }

    /// Scope-specific request defaults.
    pub fn defaults(&self) -> ScopeDefaults {
        match self {
            AnalysisScope::Flash => ScopeDefaults {
                freshness_minutes: 5,
                history_window_days: Some(1),
                target_signature_count: Some(250),
                timeout_minutes: 5,
            },
            AnalysisScope::Working => ScopeDefaults {
                freshness_minutes: 10,
                history_window_days: Some(30),
                target_signature_count: Some(2_000),
                timeout_minutes: 10,
            },
            // Deep walks the full history; no window applies.
            AnalysisScope::Deep => ScopeDefaults {
                freshness_minutes: 60,
                history_window_days: None,
                target_signature_count: None,
                timeout_minutes: 15,
            },
        }
    }

    /// The scope a completed run may cascade into.
    pub fn next(&self) -> Option<AnalysisScope> {
        match self {
            AnalysisScope::Flash => Some(AnalysisScope::Working),
            AnalysisScope::Working => Some(AnalysisScope::Deep),
            AnalysisScope::Deep => None,
        }
    }

    /// Operator-facing processing estimate surfaced in intake responses.
    pub fn estimated_processing_time(&self) -> &'static str {
        match self {
            AnalysisScope::Flash => "~30 seconds",
            AnalysisScope::Working => "~2 minutes",
            AnalysisScope::Deep => "~10 minutes",
        }
    }
}

impl fmt::Display for AnalysisScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisScope {
    type Err = crate::job::UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnalysisScope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| crate::job::UnknownName { what: "analysis scope", name: s.to_string() })
    }
}

/// Defaults applied when a dashboard request omits tuning fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeDefaults {
    /// A completed run younger than this suppresses a new one.
    pub freshness_minutes: u64,
    /// History window; `None` means full history.
    pub history_window_days: Option<u32>,
    /// Signature budget; `None` means unbounded.
    pub target_signature_count: Option<u32>,
    pub timeout_minutes: u64,
}

/// A persisted record of a completed scope run, used for freshness gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRun {
    pub wallet_address: String,
    pub scope: AnalysisScope,
    pub run_timestamp_ms: u64,
    pub status: RunStatus,
}

/// Terminal status of a persisted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

crate::simple_display! {
    RunStatus {
        Completed => "completed",
        Failed => "failed",
    }
}

#[cfg(test)]
#[path = "scope_tests.rs"]
mod tests;
