// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Holder-profiles result cache.
//!
//! Two key shapes: `holder-profiles:token:<mint>:<topN>` and
//! `holder-profiles:wallet:<addr>`. Wallet-membership invalidation runs
//! as a single Lua script over the candidate key set so a concurrent
//! reader sees either the old value or a miss, never a half-applied
//! delete.

use crate::adapter::{BrokerError, ProfilesCache};
use crate::scripts;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::sync::Arc;
use tracing::warn;
use wq_core::HolderProfilesResult;

/// Cache TTL. Results go stale as trading continues; an hour is the
/// upper bound the product tolerates.
pub const CACHE_TTL_SECS: u64 = 60 * 60;

pub(crate) fn token_key(mint: &str, top_n: u32) -> String {
    format!("holder-profiles:token:{mint}:{top_n}")
}

pub(crate) fn wallet_key(addr: &str) -> String {
    format!("holder-profiles:wallet:{addr}")
}

/// The production [`ProfilesCache`].
#[derive(Clone)]
pub struct RedisProfilesCache {
    conn: ConnectionManager,
    invalidate: Arc<Script>,
}

impl RedisProfilesCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, invalidate: Arc::new(Script::new(scripts::CACHE_INVALIDATE_WALLET)) }
    }

    async fn read(&self, key: &str) -> Result<Option<HolderProfilesResult>, BrokerError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                // Corrupted payloads read as misses; invalidation will
                // delete them.
                warn!(key, error = %e, "corrupt holder-profiles cache entry");
                Ok(None)
            }
        }
    }

    async fn write(&self, key: &str, result: &HolderProfilesResult) {
        let json = match serde_json::to_string(result) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "unserializable holder-profiles result");
                return;
            }
        };
        let mut conn = self.conn.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, json, CACHE_TTL_SECS).await {
            // Cache writes degrade gracefully; the job result is intact.
            warn!(key, error = %e, "holder-profiles cache write failed");
        }
    }

    async fn scan_token_keys(&self, pattern: &str) -> Result<Vec<String>, BrokerError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

#[async_trait]
impl ProfilesCache for RedisProfilesCache {
    async fn get_token(
        &self,
        mint: &str,
        top_n: u32,
    ) -> Result<Option<HolderProfilesResult>, BrokerError> {
        self.read(&token_key(mint, top_n)).await
    }

    async fn get_wallet(
        &self,
        addr: &str,
    ) -> Result<Option<HolderProfilesResult>, BrokerError> {
        self.read(&wallet_key(addr)).await
    }

    async fn cache_token(
        &self,
        mint: &str,
        top_n: u32,
        result: &HolderProfilesResult,
    ) -> Result<(), BrokerError> {
        self.write(&token_key(mint, top_n), result).await;
        Ok(())
    }

    async fn cache_wallet(
        &self,
        addr: &str,
        result: &HolderProfilesResult,
    ) -> Result<(), BrokerError> {
        self.write(&wallet_key(addr), result).await;
        Ok(())
    }

    async fn invalidate_for_wallet(&self, addr: &str) -> Result<u64, BrokerError> {
        let candidates = self.scan_token_keys("holder-profiles:token:*").await?;
        let mut removed: u64 = 0;

        if !candidates.is_empty() {
            let mut conn = self.conn.clone();
            let mut script = self.invalidate.prepare_invoke();
            for key in &candidates {
                script.key(key.as_str());
            }
            script.arg(addr);
            removed = script.invoke_async(&mut conn).await?;
        }

        // The wallet-scope entry goes unconditionally.
        let mut conn = self.conn.clone();
        let wallet_removed: u64 = conn.del(wallet_key(addr)).await?;
        Ok(removed + wallet_removed)
    }

    async fn invalidate_for_token(&self, mint: &str) -> Result<u64, BrokerError> {
        let keys = self.scan_token_keys(&format!("holder-profiles:token:{mint}:*")).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(keys).await?;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
