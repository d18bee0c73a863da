// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    flash = { AnalysisScope::Flash, Priority::Critical },
    working = { AnalysisScope::Working, Priority::High },
    deep = { AnalysisScope::Deep, Priority::Normal },
)]
fn scope_priorities(scope: AnalysisScope, priority: Priority) {
    assert_eq!(scope.priority(), priority);
}

#[test]
fn scope_parse_round_trip() {
    for scope in AnalysisScope::ALL {
        assert_eq!(scope.as_str().parse::<AnalysisScope>().unwrap(), scope);
    }
    assert!("shallow".parse::<AnalysisScope>().is_err());
}

#[test]
fn cascade_order() {
    assert_eq!(AnalysisScope::Flash.next(), Some(AnalysisScope::Working));
    assert_eq!(AnalysisScope::Working.next(), Some(AnalysisScope::Deep));
    assert_eq!(AnalysisScope::Deep.next(), None);
}

#[test]
fn deep_has_no_history_window() {
    let defaults = AnalysisScope::Deep.defaults();
    assert_eq!(defaults.history_window_days, None);
    assert_eq!(defaults.target_signature_count, None);
}

#[test]
fn freshness_windows_widen_with_scope() {
    let flash = AnalysisScope::Flash.defaults().freshness_minutes;
    let working = AnalysisScope::Working.defaults().freshness_minutes;
    let deep = AnalysisScope::Deep.defaults().freshness_minutes;
    assert!(flash < working);
    assert!(working < deep);
}

#[test]
fn run_serde_round_trip() {
    let run = AnalysisRun {
        wallet_address: "Wallet2".to_string(),
        scope: AnalysisScope::Working,
        run_timestamp_ms: 1_700_000_000_000,
        status: RunStatus::Completed,
    };
    let json = serde_json::to_string(&run).unwrap();
    assert!(json.contains("\"walletAddress\":\"Wallet2\""));
    assert!(json.contains("\"scope\":\"working\""));
    let parsed: AnalysisRun = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, run);
}
