// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orphan-lock sweep, run once after broker connectivity is established.
//!
//! A lock is orphaned when its owning job is absent, completed, or
//! failed, typically after a worker died between acquiring the lock and
//! reaching its terminal transition. The sweep walks `lock:*` with a
//! non-blocking cursor scan and releases orphans with the owner-checked
//! CAS, so a lock re-acquired mid-sweep is never touched.

use crate::adapter::{BrokerError, LockAdapter, QueueAdapter};
use tracing::{info, warn};
use wq_core::{JobId, QueueName};

/// Outcome of one sweep pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub released: Vec<String>,
    /// Keys whose shape we did not recognize; left alone.
    pub skipped: Vec<String>,
}

/// Map a lock key's (domain, operation) to the queue its owner job
/// lives on. Returns `None` for unrecognized shapes.
pub(crate) fn implied_queue(key: &str) -> Option<QueueName> {
    let mut parts = key.split(':');
    if parts.next() != Some("lock") {
        return None;
    }
    match (parts.next()?, parts.next()) {
        ("wallet", Some("sync")) => Some(QueueName::WalletOperations),
        ("wallet", Some("pnl" | "behavior" | "dashboard-analysis")) => {
            Some(QueueName::AnalysisOperations)
        }
        ("similarity", Some(_)) => Some(QueueName::SimilarityOperations),
        _ => None,
    }
}

/// Sweep all lock keys and release orphans.
pub async fn sweep_orphan_locks<Q, L>(queues: &Q, locks: &L) -> Result<SweepReport, BrokerError>
where
    Q: QueueAdapter,
    L: LockAdapter,
{
    let held = locks.scan_locks("lock:*").await?;
    let mut report = SweepReport { scanned: held.len(), ..SweepReport::default() };

    for (key, owner) in held {
        if implied_queue(&key).is_none() {
            warn!(key, "unrecognized lock key shape, leaving alone");
            report.skipped.push(key);
            continue;
        }

        let orphaned = match queues.get_job(&JobId::new(owner.clone())).await? {
            None => true,
            Some(job) => job.is_terminal(),
        };
        if !orphaned {
            continue;
        }

        // Owner-checked release: if the key changed hands since the scan,
        // this is a no-op and the new owner keeps its lock.
        if locks.release(&key, &owner).await? {
            info!(key, owner, "released orphan lock");
            report.released.push(key);
        }
    }

    if !report.released.is_empty() {
        info!(
            scanned = report.scanned,
            released = report.released.len(),
            "orphan lock sweep finished"
        );
    }
    Ok(report)
}

#[cfg(test)]
#[path = "sweep_tests.rs"]
mod tests;
