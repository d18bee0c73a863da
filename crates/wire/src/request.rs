// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Intake request bodies.
//!
//! Closed-set fields (scope, vector type) arrive as strings and are
//! parsed by the dispatcher so an out-of-set value becomes a clean
//! `invalid-input` rejection rather than a deserialization error.

use serde::Deserialize;
use std::collections::BTreeMap;
use wq_core::WalletBalances;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalysisRequest {
    pub wallet_address: String,
    #[serde(default)]
    pub analysis_scope: Option<String>,
    #[serde(default)]
    pub trigger_source: Option<String>,
    #[serde(default)]
    pub history_window_days: Option<u32>,
    #[serde(default)]
    pub target_signature_count: Option<u32>,
    #[serde(default)]
    pub force_refresh: Option<bool>,
    #[serde(default)]
    pub enrich_metadata: Option<bool>,
    #[serde(default)]
    pub queue_working_after: Option<bool>,
    #[serde(default)]
    pub queue_deep_after: Option<bool>,
    #[serde(default)]
    pub timeout_minutes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityQueueRequest {
    pub wallet_addresses: Vec<String>,
    #[serde(default)]
    pub vector_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichBalancesRequest {
    pub wallet_balances: BTreeMap<String, WalletBalances>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderProfilesTokenRequest {
    pub token_mint: String,
    #[serde(default)]
    pub top_n: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderProfilesWalletRequest {
    pub wallet_address: String,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
