// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::collections::HashMap;
use std::time::Duration;
use wq_broker::RedisSettings;
use wq_core::JobKind;

/// Broker endpoint: `REDIS_HOST` / `REDIS_PORT`.
pub fn redis_settings() -> RedisSettings {
    let defaults = RedisSettings::default();
    RedisSettings {
        host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
        port: std::env::var("REDIS_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port),
    }
}

/// HTTP listen port (default 3000).
pub fn http_port() -> u16 {
    std::env::var("HTTP_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(3000)
}

/// CORS allow-list origin for the dashboard frontend.
pub fn frontend_url() -> Option<String> {
    std::env::var("FRONTEND_URL").ok().filter(|s| !s.is_empty())
}

/// Per-kind handler timeout overrides (`*_TIMEOUT_MS`).
pub fn timeout_overrides() -> HashMap<JobKind, Duration> {
    let mut overrides = HashMap::new();
    for kind in JobKind::ALL {
        if let Some(timeout) = parse_ms(std::env::var(kind.timeout_env_var()).ok()) {
            overrides.insert(kind, timeout);
        }
    }
    overrides
}

/// Shutdown drain deadline (default 30s, configurable via `DRAIN_TIMEOUT_MS`).
pub fn drain_timeout() -> Duration {
    parse_ms(std::env::var("DRAIN_TIMEOUT_MS").ok()).unwrap_or(Duration::from_secs(30))
}

fn parse_ms(raw: Option<String>) -> Option<Duration> {
    raw.and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
