// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handlers for the similarity flow and token-balance enrichment.

use super::{parse_payload, HandlerError, Handlers};
use crate::progress::{ProgressReporter, ProgressSink};
use wq_broker::{ProfilesCache, QueueAdapter, RunStore};
use wq_core::{Clock, EnrichTokenBalancesPayload, JobRecord, SimilarityFlowPayload};

pub(super) async fn flow<Q, R, P, C, S>(
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
    let payload: SimilarityFlowPayload = parse_payload(job)?;
    reporter
        .stage("similarity", &format!("comparing {} wallets", payload.wallet_addresses.len()))
        .await?;
    Ok(h.analyzers.similarity.run_flow(&payload, reporter).await?)
}

pub(super) async fn enrich<Q, R, P, C, S>(
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
    let payload: EnrichTokenBalancesPayload = parse_payload(job)?;
    reporter
        .stage(
            "enrich",
            &format!(
                "enriching {} tokens across {} wallets",
                payload.token_count(),
                payload.wallet_count()
            ),
        )
        .await?;
    Ok(h.analyzers.enricher.enrich(&payload, reporter).await?)
}
