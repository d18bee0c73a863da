// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completed dashboard-run store backing the freshness gate.
//!
//! One hash per wallet, one field per scope, holding the latest run as
//! JSON. The upstream system of record for runs is relational; this
//! broker-side store is the seam the scope controller reads through.

use crate::adapter::{BrokerError, RunStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;
use wq_core::{AnalysisRun, AnalysisScope, RunStatus};

fn runs_key(wallet: &str) -> String {
    format!("analysis-runs:{wallet}")
}

/// The production [`RunStore`].
#[derive(Clone)]
pub struct RedisRuns {
    conn: ConnectionManager,
}

impl RedisRuns {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl RunStore for RedisRuns {
    async fn latest_completed(
        &self,
        wallet: &str,
        scope: AnalysisScope,
    ) -> Result<Option<AnalysisRun>, BrokerError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(runs_key(wallet), scope.as_str()).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match serde_json::from_str::<AnalysisRun>(&raw) {
            Ok(run) if run.status == RunStatus::Completed => Ok(Some(run)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!(wallet, scope = %scope, error = %e, "corrupt analysis-run record");
                Ok(None)
            }
        }
    }

    async fn record_run(&self, run: &AnalysisRun) -> Result<(), BrokerError> {
        let json = serde_json::to_string(run).map_err(|e| BrokerError::Corrupt {
            id: run.wallet_address.clone(),
            reason: format!("unserializable run: {e}"),
        })?;
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(runs_key(&run.wallet_address), run.scope.as_str(), json)
            .await?;
        Ok(())
    }
}
