// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progress values reported by job handlers.

use serde::{Deserialize, Serialize};

/// A progress report: either a percentage or a structured stage object.
///
/// Handlers may also emit bare strings; numeric strings coerce to a
/// percentage, anything else becomes `{ "message": … }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressValue {
    Percent(u8),
    Structured(serde_json::Value),
}

impl ProgressValue {
    /// Coerce an arbitrary JSON value into a progress value.
    ///
    /// Numbers clamp to 0..=100. Numeric strings parse as numbers; other
    /// strings wrap into `{ "message": … }`. Objects pass through.
    pub fn coerce(value: serde_json::Value) -> ProgressValue {
        match value {
            serde_json::Value::Number(n) => {
                let pct = n.as_f64().unwrap_or(0.0).clamp(0.0, 100.0);
                ProgressValue::Percent(pct as u8)
            }
            serde_json::Value::String(s) => match s.trim().parse::<f64>() {
                Ok(n) => ProgressValue::Percent(n.clamp(0.0, 100.0) as u8),
                Err(_) => ProgressValue::Structured(serde_json::json!({ "message": s })),
            },
            other => ProgressValue::Structured(other),
        }
    }

    /// The percentage, when this is a percent report.
    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressValue::Percent(p) => Some(*p),
            ProgressValue::Structured(_) => None,
        }
    }
}

impl From<u8> for ProgressValue {
    fn from(pct: u8) -> Self {
        ProgressValue::Percent(pct.min(100))
    }
}

impl From<&str> for ProgressValue {
    fn from(s: &str) -> Self {
        ProgressValue::coerce(serde_json::Value::String(s.to_string()))
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
