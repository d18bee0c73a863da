// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parse_ms_accepts_integers() {
    assert_eq!(parse_ms(Some("1500".to_string())), Some(Duration::from_millis(1500)));
}

#[test]
fn parse_ms_rejects_garbage() {
    assert_eq!(parse_ms(Some("soon".to_string())), None);
    assert_eq!(parse_ms(None), None);
}

#[test]
fn every_kind_has_a_timeout_env_var() {
    // The override map can only be as complete as the vars themselves.
    let mut seen = std::collections::HashSet::new();
    for kind in JobKind::ALL {
        assert!(kind.timeout_env_var().ends_with("_TIMEOUT_MS"));
        assert!(seen.insert(kind.timeout_env_var()));
    }
}
