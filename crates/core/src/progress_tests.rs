// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn numbers_become_percentages() {
    assert_eq!(ProgressValue::coerce(json!(42)), ProgressValue::Percent(42));
    assert_eq!(ProgressValue::coerce(json!(42.7)), ProgressValue::Percent(42));
}

#[test]
fn numbers_clamp_to_percent_range() {
    assert_eq!(ProgressValue::coerce(json!(250)), ProgressValue::Percent(100));
    assert_eq!(ProgressValue::coerce(json!(-3)), ProgressValue::Percent(0));
}

#[test]
fn numeric_strings_parse_as_percentages() {
    assert_eq!(ProgressValue::coerce(json!("55")), ProgressValue::Percent(55));
    assert_eq!(ProgressValue::coerce(json!(" 80 ")), ProgressValue::Percent(80));
}

#[test]
fn other_strings_wrap_into_message_objects() {
    assert_eq!(
        ProgressValue::coerce(json!("fetching signatures")),
        ProgressValue::Structured(json!({ "message": "fetching signatures" }))
    );
}

#[test]
fn objects_pass_through() {
    let stage = json!({ "stage": "enrich", "message": "resolving mints" });
    assert_eq!(ProgressValue::coerce(stage.clone()), ProgressValue::Structured(stage));
}

#[test]
fn percent_serializes_as_bare_number() {
    let json = serde_json::to_string(&ProgressValue::Percent(75)).unwrap();
    assert_eq!(json, "75");
    let parsed: ProgressValue = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, ProgressValue::Percent(75));
}

#[test]
fn from_u8_clamps() {
    assert_eq!(ProgressValue::from(200u8), ProgressValue::Percent(100));
}
