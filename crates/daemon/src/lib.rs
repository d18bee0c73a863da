// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wq-daemon: HTTP intake, realtime gateway, and lifecycle wiring.
//!
//! The embedding application constructs an [`wq_engine::AnalyzerSet`]
//! (the analyzers themselves live outside this workspace) and calls
//! [`lifecycle::run`]:
//!
//! ```ignore
//! let config = wq_daemon::Config::from_env();
//! wq_daemon::lifecycle::run(config, analyzers).await?;
//! ```

pub mod env;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod state;

pub use http::{router, ApiError};
pub use lifecycle::{run, Config, LifecycleError};
pub use state::AppState;

/// Install the daemon's tracing subscriber (env-filtered, compact).
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,wq_broker=info,wq_engine=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
