// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic job-id derivation and request ids.

use crate::job::{JobId, JobKind};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex digest length folded into a job id.
const DIGEST_CHARS: usize = 16;

/// Derive the deterministic job id for (kind, natural key, optional request id).
///
/// This is a pure function: two callers with the same inputs produce the
/// same id across processes, which is what lets the broker deduplicate
/// enqueues. The natural key is the business identifier (wallet address,
/// request id, (mint, topN) pair) that should collapse duplicate work.
pub fn derive_job_id(kind: JobKind, natural_key: &str, request_id: Option<&str>) -> JobId {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(natural_key.as_bytes());
    if let Some(request_id) = request_id {
        hasher.update([0u8]);
        hasher.update(request_id.as_bytes());
    }
    let digest = hasher.finalize();

    use fmt::Write as _;
    let mut hex = String::with_capacity(DIGEST_CHARS);
    for byte in digest.iter().take(DIGEST_CHARS / 2) {
        // Writing to a String cannot fail.
        let _ = write!(hex, "{byte:02x}");
    }

    JobId::new(format!("{}-{hex}", kind.as_str()))
}

/// Correlation id for an intake request.
///
/// Random, unlike job ids: two requests for the same work share a job id
/// but keep distinct request ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RequestId(pub String);

impl RequestId {
    const PREFIX: &'static str = "req-";

    /// Generate a new random request id.
    pub fn new() -> Self {
        Self(format!("{}{}", Self::PREFIX, nanoid::nanoid!(19)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
#[path = "jobid_tests.rs"]
mod tests;
