// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis connection bootstrap.

use crate::adapter::BrokerError;
use redis::aio::ConnectionManager;

/// Broker endpoint settings.
#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 6379 }
    }
}

impl RedisSettings {
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

/// Open a managed connection to the broker.
///
/// [`ConnectionManager`] reconnects transparently; transient failures
/// surface as [`BrokerError::Transport`] on individual operations.
pub async fn connect(settings: &RedisSettings) -> Result<ConnectionManager, BrokerError> {
    let client = redis::Client::open(settings.url())?;
    let conn = ConnectionManager::new(client).await?;
    Ok(conn)
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
