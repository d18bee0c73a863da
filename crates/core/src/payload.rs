// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed payloads, one per job kind.
//!
//! The broker stores payloads as JSON; these are the schemas the
//! dispatcher writes and the handlers read back.

use crate::scope::AnalysisScope;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncWalletPayload {
    pub wallet_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzePnlPayload {
    pub wallet_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBehaviorPayload {
    pub wallet_address: String,
}

/// Payload for a scoped dashboard analysis.
///
/// All tuning fields are resolved (scope defaults applied) before the job
/// is written, so the handler never re-derives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardAnalysisPayload {
    pub wallet_address: String,
    pub scope: AnalysisScope,
    /// `None` for the deep scope (full history).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_window_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_signature_count: Option<u32>,
    #[serde(default)]
    pub force_refresh: bool,
    #[serde(default)]
    pub enrich_metadata: bool,
    #[serde(default)]
    pub queue_working_after: bool,
    #[serde(default)]
    pub queue_deep_after: bool,
    pub timeout_minutes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_source: Option<String>,
    pub request_id: String,
}

impl DashboardAnalysisPayload {
    /// Natural key deduplicating dashboard work per (wallet, scope).
    pub fn natural_key(wallet_address: &str, scope: AnalysisScope) -> String {
        format!("{wallet_address}:{scope}")
    }

    /// Follow-up scopes this run will cascade into on completion.
    pub fn follow_up_scopes(&self) -> Vec<AnalysisScope> {
        let mut scopes = Vec::new();
        if self.scope == AnalysisScope::Flash && self.queue_working_after {
            scopes.push(AnalysisScope::Working);
        }
        if self.scope != AnalysisScope::Deep && self.queue_deep_after {
            scopes.push(AnalysisScope::Deep);
        }
        scopes
    }
}

/// Vector space used for similarity scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorType {
    #[default]
    Capital,
    Binary,
}

crate::simple_display! {
    VectorType {
        Capital => "capital",
        Binary => "binary",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityFlowPayload {
    pub request_id: String,
    pub wallet_addresses: Vec<String>,
    #[serde(default)]
    pub vector_type: VectorType,
}

/// A single token position inside an enrichment request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub mint: String,
    pub ui_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalances {
    pub token_balances: Vec<TokenBalance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichTokenBalancesPayload {
    /// Keyed by wallet address; BTreeMap keeps the natural key stable.
    pub wallet_balances: BTreeMap<String, WalletBalances>,
}

impl EnrichTokenBalancesPayload {
    /// Natural key over the wallet set. Sorted map iteration makes the
    /// same set of wallets hash to the same job id.
    pub fn natural_key(&self) -> String {
        let mut key = String::new();
        for wallet in self.wallet_balances.keys() {
            if !key.is_empty() {
                key.push(',');
            }
            key.push_str(wallet);
        }
        key
    }

    pub fn wallet_count(&self) -> usize {
        self.wallet_balances.len()
    }

    pub fn token_count(&self) -> usize {
        self.wallet_balances.values().map(|w| w.token_balances.len()).sum()
    }
}

/// Holder-profiles analysis target: a token's top holders, or one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum HolderProfilesPayload {
    #[serde(rename_all = "camelCase")]
    Token { token_mint: String, top_n: u32 },
    #[serde(rename_all = "camelCase")]
    Wallet { wallet_address: String },
}

impl HolderProfilesPayload {
    pub fn natural_key(&self) -> String {
        match self {
            HolderProfilesPayload::Token { token_mint, top_n } => format!("{token_mint}:{top_n}"),
            HolderProfilesPayload::Wallet { wallet_address } => wallet_address.clone(),
        }
    }
}

/// One profiled holder inside a holder-profiles result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderProfile {
    pub wallet_address: String,
    /// Analyzer-specific metrics, passed through untouched.
    #[serde(flatten)]
    pub metrics: serde_json::Map<String, serde_json::Value>,
}

/// The cached holder-profiles result shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HolderProfilesResult {
    pub profiles: Vec<HolderProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_mint: Option<String>,
    pub generated_at_ms: u64,
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
