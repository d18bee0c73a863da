// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Holder-profiles handler: consult the cache, compute on miss, cache
//! the result. Cache faults degrade to miss semantics.

use super::{parse_payload, HandlerError, Handlers};
use crate::progress::{ProgressReporter, ProgressSink};
use tracing::warn;
use wq_broker::{ProfilesCache, QueueAdapter, RunStore};
use wq_core::{Clock, HolderProfilesPayload, HolderProfilesResult, JobRecord};

pub(super) async fn run<Q, R, P, C, S>(
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
    let payload: HolderProfilesPayload = parse_payload(job)?;
    match payload {
        HolderProfilesPayload::Token { token_mint, top_n } => {
            let cached = match h.cache.get_token(&token_mint, top_n).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(mint = %token_mint, error = %e, "cache read failed, treating as miss");
                    None
                }
            };
            if let Some(result) = cached {
                return Ok(wrap(result, true));
            }

            reporter.stage("profiles", "profiling top holders").await?;
            let result =
                h.analyzers.holder_profiler.profile_token(&token_mint, top_n, reporter).await?;
            let _ = h.cache.cache_token(&token_mint, top_n, &result).await;
            Ok(wrap(result, false))
        }
        HolderProfilesPayload::Wallet { wallet_address } => {
            let cached = match h.cache.get_wallet(&wallet_address).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(wallet = %wallet_address, error = %e, "cache read failed, treating as miss");
                    None
                }
            };
            if let Some(result) = cached {
                return Ok(wrap(result, true));
            }

            reporter.stage("profiles", "profiling wallet").await?;
            let result =
                h.analyzers.holder_profiler.profile_wallet(&wallet_address, reporter).await?;
            let _ = h.cache.cache_wallet(&wallet_address, &result).await;
            Ok(wrap(result, false))
        }
    }
}

fn wrap(result: HolderProfilesResult, cached: bool) -> serde_json::Value {
    serde_json::json!({
        "cached": cached,
        "profileCount": result.profiles.len(),
        "result": result,
    })
}
