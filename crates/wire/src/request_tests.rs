// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn dashboard_request_fills_defaults() {
    let req: DashboardAnalysisRequest = serde_json::from_value(json!({
        "walletAddress": "Wallet1",
    }))
    .unwrap();
    assert_eq!(req.wallet_address, "Wallet1");
    assert_eq!(req.analysis_scope, None);
    assert_eq!(req.force_refresh, None);
}

#[test]
fn dashboard_request_reads_camel_case_fields() {
    let req: DashboardAnalysisRequest = serde_json::from_value(json!({
        "walletAddress": "Wallet1",
        "analysisScope": "flash",
        "queueWorkingAfter": true,
        "queueDeepAfter": true,
        "forceRefresh": true,
        "historyWindowDays": 14,
        "timeoutMinutes": 20,
    }))
    .unwrap();
    assert_eq!(req.analysis_scope.as_deref(), Some("flash"));
    assert_eq!(req.queue_working_after, Some(true));
    assert_eq!(req.queue_deep_after, Some(true));
    assert_eq!(req.force_refresh, Some(true));
    assert_eq!(req.history_window_days, Some(14));
    assert_eq!(req.timeout_minutes, Some(20));
}

#[test]
fn similarity_request_parses_wallet_list() {
    let req: SimilarityQueueRequest = serde_json::from_value(json!({
        "walletAddresses": ["WalletA", "WalletB"],
        "vectorType": "binary",
    }))
    .unwrap();
    assert_eq!(req.wallet_addresses.len(), 2);
    assert_eq!(req.vector_type.as_deref(), Some("binary"));
}

#[test]
fn enrich_request_parses_nested_balances() {
    let req: EnrichBalancesRequest = serde_json::from_value(json!({
        "walletBalances": {
            "WalletA": { "tokenBalances": [{ "mint": "MintX", "uiBalance": 4.2 }] },
        }
    }))
    .unwrap();
    let balances = req.wallet_balances.get("WalletA").unwrap();
    assert_eq!(balances.token_balances[0].mint, "MintX");
}

#[test]
fn holder_profiles_requests_parse() {
    let token: HolderProfilesTokenRequest =
        serde_json::from_value(json!({ "tokenMint": "MintX", "topN": 25 })).unwrap();
    assert_eq!(token.top_n, Some(25));

    let wallet: HolderProfilesWalletRequest =
        serde_json::from_value(json!({ "walletAddress": "WalletQ" })).unwrap();
    assert_eq!(wallet.wallet_address, "WalletQ");
}
