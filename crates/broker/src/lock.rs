// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed distributed lock service.
//!
//! Acquire is a single `SET NX PX`; release and extend are owner-checked
//! Lua CAS. Lock keys follow `lock:<domain>:<operation>:<natural-key>`.

use crate::adapter::{BrokerError, LockAdapter};
use crate::scripts;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::sync::Arc;

/// The production [`LockAdapter`].
#[derive(Clone)]
pub struct RedisLocks {
    conn: ConnectionManager,
    release: Arc<Script>,
    extend: Arc<Script>,
}

impl RedisLocks {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            release: Arc::new(Script::new(scripts::LOCK_RELEASE)),
            extend: Arc::new(Script::new(scripts::LOCK_EXTEND)),
        }
    }
}

#[async_trait]
impl LockAdapter for RedisLocks {
    async fn acquire(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, owner: &str) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let released: u8 = self.release.key(key).arg(owner).invoke_async(&mut conn).await?;
        Ok(released == 1)
    }

    async fn extend(&self, key: &str, owner: &str, ttl_ms: u64) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let extended: u8 =
            self.extend.key(key).arg(owner).arg(ttl_ms).invoke_async(&mut conn).await?;
        Ok(extended == 1)
    }

    async fn check(&self, key: &str, owner: Option<&str>) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let current: Option<String> = conn.get(key).await?;
        Ok(match (current, owner) {
            (Some(held), Some(expected)) => held == expected,
            (Some(_), None) => true,
            (None, _) => false,
        })
    }

    async fn owner(&self, key: &str) -> Result<Option<String>, BrokerError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn ttl_ms(&self, key: &str) -> Result<Option<u64>, BrokerError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.pttl(key).await?;
        // -2: no key; -1: no expiry (never set by us, treat as held forever).
        Ok(match ttl {
            t if t >= 0 => Some(t as u64),
            -1 => Some(u64::MAX),
            _ => None,
        })
    }

    async fn force_release(&self, key: &str) -> Result<bool, BrokerError> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn scan_locks(&self, pattern: &str) -> Result<Vec<(String, String)>, BrokerError> {
        let mut conn = self.conn.clone();
        let mut found = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;
            for key in keys {
                // The value may expire between SCAN and GET.
                let owner: Option<String> = conn.get(&key).await?;
                if let Some(owner) = owner {
                    found.push((key, owner));
                }
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(found)
    }
}
