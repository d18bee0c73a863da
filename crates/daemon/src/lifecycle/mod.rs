// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup sequence, shutdown drain.

mod startup;

pub use startup::run;

use crate::env;
use thiserror::Error;
use wq_broker::{BrokerError, RedisSettings};
use wq_engine::WorkerOptions;

/// Daemon configuration, resolved once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisSettings,
    pub http_port: u16,
    pub frontend_url: Option<String>,
    pub worker_options: WorkerOptions,
}

impl Config {
    /// Resolve the full configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            redis: env::redis_settings(),
            http_port: env::http_port(),
            frontend_url: env::frontend_url(),
            worker_options: WorkerOptions {
                timeouts: env::timeout_overrides(),
                drain: env::drain_timeout(),
                ..WorkerOptions::default()
            },
        }
    }
}

/// Errors that end the daemon.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("broker: {0}")]
    Broker(#[from] BrokerError),
    #[error("bind failed: {0}")]
    Bind(#[from] std::io::Error),
}
