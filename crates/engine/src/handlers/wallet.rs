// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for the single-wallet kinds: sync, PnL, behavior.

use super::{parse_payload, HandlerError, Handlers};
use crate::progress::{ProgressReporter, ProgressSink};
use tracing::warn;
use wq_broker::{ProfilesCache, QueueAdapter, RunStore};
use wq_core::{
    AnalyzeBehaviorPayload, AnalyzePnlPayload, Clock, JobRecord, SyncWalletPayload,
};

pub(super) async fn sync<Q, R, P, C, S>(
    h: &Handlers<Q, R, P, C>,
    job: &JobRecord,
    reporter: &ProgressReporter<Q, S, C>,
) -> Result<serde_json::Value, HandlerError>
where
    Q: QueueAdapter,
    R: RunStore,
    P: ProfilesCache,
    C: Clock,
    S: ProgressSink,
{
    let payload: SyncWalletPayload = parse_payload(job)?;
    let result = h.analyzers.syncer.sync(&payload.wallet_address, reporter).await?;

    // The wallet's data just changed: cached holder profiles that
    // mention it are now stale. Invalidation failures degrade to
    // serving slightly stale cache until TTL.
    if let Err(e) = h.cache.invalidate_for_wallet(&payload.wallet_address).await {
        warn!(wallet = %payload.wallet_address, error = %e, "post-sync cache invalidation failed");
    }
    Ok(result)
}

pub(super) async fn pnl<Q, R, P, C, S>(
    h: &Handlers<Q, R, P, C>,
    job: &JobRecord,
    reporter: &ProgressReporter<Q, S, C>,
) -> Result<serde_json::Value, HandlerError>
where
    Q: QueueAdapter,
    R: RunStore,
    P: ProfilesCache,
    C: Clock,
    S: ProgressSink,
{
    let payload: AnalyzePnlPayload = parse_payload(job)?;
    Ok(h.analyzers.pnl.analyze_pnl(&payload.wallet_address, reporter).await?)
}

pub(super) async fn behavior<Q, R, P, C, S>(
    h: &Handlers<Q, R, P, C>,
    job: &JobRecord,
    reporter: &ProgressReporter<Q, S, C>,
) -> Result<serde_json::Value, HandlerError>
where
    Q: QueueAdapter,
    R: RunStore,
    P: ProfilesCache,
    C: Clock,
    S: ProgressSink,
{
    let payload: AnalyzeBehaviorPayload = parse_payload(job)?;
    Ok(h.analyzers.behavior.analyze_behavior(&payload.wallet_address, reporter).await?)
}
