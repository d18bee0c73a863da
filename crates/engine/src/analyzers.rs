// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Analyzer collaborator seams.
//!
//! The PnL, behavior, similarity, and enrichment computations are owned
//! by other parts of the system; the worker pool only drives them. Each
//! is a trait object the composition root injects, and every method
//! receives a [`ProgressProbe`] so long computations can report progress
//! and observe cancellation.

use crate::progress::{Aborted, ProgressProbe};
use async_trait::async_trait;
use std::sync::Arc;
use wq_core::{
    DashboardAnalysisPayload, EnrichTokenBalancesPayload, HolderProfilesResult,
    SimilarityFlowPayload,
};

/// How an analyzer failure should be treated by the retry machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerErrorKind {
    /// Transient (RPC hiccup, upstream rate limit); worth a retry.
    Retryable,
    /// Broken input or impossible request; retrying cannot help.
    Permanent,
    /// The computation surrendered to a cancellation request.
    Cancelled,
}

/// Error surfaced by an analyzer.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct AnalyzerError {
    pub message: String,
    pub kind: AnalyzerErrorKind,
}

impl AnalyzerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: AnalyzerErrorKind::Retryable }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self { message: message.into(), kind: AnalyzerErrorKind::Permanent }
    }
}

impl From<Aborted> for AnalyzerError {
    fn from(_: Aborted) -> Self {
        Self { message: "cancelled".to_string(), kind: AnalyzerErrorKind::Cancelled }
    }
}

#[async_trait]
pub trait WalletSyncer: Send + Sync {
    /// Pull the wallet's transaction history up to the chain tip.
    async fn sync(
        &self,
        wallet: &str,
        probe: &dyn ProgressProbe,
    ) -> Result<serde_json::Value, AnalyzerError>;
}

#[async_trait]
pub trait PnlAnalyzer: Send + Sync {
    async fn analyze_pnl(
        &self,
        wallet: &str,
        probe: &dyn ProgressProbe,
    ) -> Result<serde_json::Value, AnalyzerError>;
}

#[async_trait]
pub trait BehaviorAnalyzer: Send + Sync {
    async fn analyze_behavior(
        &self,
        wallet: &str,
        probe: &dyn ProgressProbe,
    ) -> Result<serde_json::Value, AnalyzerError>;
}

#[async_trait]
pub trait DashboardAnalyzer: Send + Sync {
    /// Run the scoped dashboard pipeline (sync + pnl + behavior slices)
    /// for one wallet. The payload arrives fully resolved.
    async fn analyze_dashboard(
        &self,
        payload: &DashboardAnalysisPayload,
        probe: &dyn ProgressProbe,
    ) -> Result<serde_json::Value, AnalyzerError>;
}

#[async_trait]
pub trait SimilarityEngine: Send + Sync {
    async fn run_flow(
        &self,
        payload: &SimilarityFlowPayload,
        probe: &dyn ProgressProbe,
    ) -> Result<serde_json::Value, AnalyzerError>;
}

#[async_trait]
pub trait BalanceEnricher: Send + Sync {
    async fn enrich(
        &self,
        payload: &EnrichTokenBalancesPayload,
        probe: &dyn ProgressProbe,
    ) -> Result<serde_json::Value, AnalyzerError>;
}

#[async_trait]
pub trait HolderProfiler: Send + Sync {
    async fn profile_token(
        &self,
        mint: &str,
        top_n: u32,
        probe: &dyn ProgressProbe,
    ) -> Result<HolderProfilesResult, AnalyzerError>;

    async fn profile_wallet(
        &self,
        wallet: &str,
        probe: &dyn ProgressProbe,
    ) -> Result<HolderProfilesResult, AnalyzerError>;
}

/// The full analyzer wiring handed to the worker pool.
#[derive(Clone)]
pub struct AnalyzerSet {
    pub syncer: Arc<dyn WalletSyncer>,
    pub pnl: Arc<dyn PnlAnalyzer>,
    pub behavior: Arc<dyn BehaviorAnalyzer>,
    pub dashboard: Arc<dyn DashboardAnalyzer>,
    pub similarity: Arc<dyn SimilarityEngine>,
    pub enricher: Arc<dyn BalanceEnricher>,
    pub holder_profiler: Arc<dyn HolderProfiler>,
}

// ── Scripted fakes for tests ────────────────────────────────────────────

#[cfg(any(test, feature = "test-support"))]
pub use fakes::ScriptedAnalyzers;

#[cfg(any(test, feature = "test-support"))]
mod fakes {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;
    use wq_core::{HolderProfile, ProgressValue};

    /// A scripted stand-in for every analyzer trait.
    ///
    /// By default each call reports one progress tick and returns a small
    /// JSON result. Tests can make it fail the first N calls, sleep, or
    /// keep reporting progress until cancelled.
    #[derive(Clone, Default)]
    pub struct ScriptedAnalyzers {
        inner: Arc<Mutex<Script>>,
    }

    #[derive(Default)]
    struct Script {
        fail_first: u32,
        fail_kind: Option<AnalyzerErrorKind>,
        delay: Option<Duration>,
        /// When set, the analyzer loops progress ticks until cancelled.
        run_until_cancelled: bool,
        calls: u32,
        profiles: Vec<String>,
    }

    impl ScriptedAnalyzers {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the first `n` calls with a retryable error.
        pub fn fail_first(self, n: u32) -> Self {
            {
                let mut script = self.inner.lock();
                script.fail_first = n;
                script.fail_kind = Some(AnalyzerErrorKind::Retryable);
            }
            self
        }

        /// Fail the first `n` calls with a permanent error.
        pub fn fail_first_permanent(self, n: u32) -> Self {
            {
                let mut script = self.inner.lock();
                script.fail_first = n;
                script.fail_kind = Some(AnalyzerErrorKind::Permanent);
            }
            self
        }

        /// Sleep before returning (for timeout tests).
        pub fn delay(self, delay: Duration) -> Self {
            self.inner.lock().delay = Some(delay);
            self
        }

        /// Keep reporting progress until the probe reports cancellation.
        pub fn run_until_cancelled(self) -> Self {
            self.inner.lock().run_until_cancelled = true;
            self
        }

        /// Wallets to include in holder-profiles results.
        pub fn with_profiles(self, wallets: &[&str]) -> Self {
            self.inner.lock().profiles = wallets.iter().map(|w| w.to_string()).collect();
            self
        }

        pub fn calls(&self) -> u32 {
            self.inner.lock().calls
        }

        pub fn set(&self) -> AnalyzerSet {
            AnalyzerSet {
                syncer: Arc::new(self.clone()),
                pnl: Arc::new(self.clone()),
                behavior: Arc::new(self.clone()),
                dashboard: Arc::new(self.clone()),
                similarity: Arc::new(self.clone()),
                enricher: Arc::new(self.clone()),
                holder_profiler: Arc::new(self.clone()),
            }
        }

        async fn step(
            &self,
            label: &str,
            probe: &dyn ProgressProbe,
        ) -> Result<serde_json::Value, AnalyzerError> {
            let (fail, kind, delay, endless) = {
                let mut script = self.inner.lock();
                script.calls += 1;
                let fail = script.calls <= script.fail_first;
                (fail, script.fail_kind, script.delay, script.run_until_cancelled)
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if endless {
                loop {
                    probe.report(ProgressValue::Percent(50)).await?;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
            probe.report(ProgressValue::Percent(50)).await?;
            if fail {
                let kind = kind.unwrap_or(AnalyzerErrorKind::Retryable);
                return Err(AnalyzerError { message: format!("{label} blew up"), kind });
            }
            probe.report(ProgressValue::Percent(100)).await?;
            Ok(serde_json::json!({ "analyzer": label, "ok": true }))
        }
    }

    #[async_trait]
    impl WalletSyncer for ScriptedAnalyzers {
        async fn sync(
            &self,
            _wallet: &str,
            probe: &dyn ProgressProbe,
        ) -> Result<serde_json::Value, AnalyzerError> {
            self.step("sync", probe).await
        }
    }

    #[async_trait]
    impl PnlAnalyzer for ScriptedAnalyzers {
        async fn analyze_pnl(
            &self,
            _wallet: &str,
            probe: &dyn ProgressProbe,
        ) -> Result<serde_json::Value, AnalyzerError> {
            self.step("pnl", probe).await
        }
    }

    #[async_trait]
    impl BehaviorAnalyzer for ScriptedAnalyzers {
        async fn analyze_behavior(
            &self,
            _wallet: &str,
            probe: &dyn ProgressProbe,
        ) -> Result<serde_json::Value, AnalyzerError> {
            self.step("behavior", probe).await
        }
    }

    #[async_trait]
    impl DashboardAnalyzer for ScriptedAnalyzers {
        async fn analyze_dashboard(
            &self,
            _payload: &DashboardAnalysisPayload,
            probe: &dyn ProgressProbe,
        ) -> Result<serde_json::Value, AnalyzerError> {
            self.step("dashboard", probe).await
        }
    }

    #[async_trait]
    impl SimilarityEngine for ScriptedAnalyzers {
        async fn run_flow(
            &self,
            _payload: &SimilarityFlowPayload,
            probe: &dyn ProgressProbe,
        ) -> Result<serde_json::Value, AnalyzerError> {
            self.step("similarity", probe).await
        }
    }

    #[async_trait]
    impl BalanceEnricher for ScriptedAnalyzers {
        async fn enrich(
            &self,
            _payload: &EnrichTokenBalancesPayload,
            probe: &dyn ProgressProbe,
        ) -> Result<serde_json::Value, AnalyzerError> {
            self.step("enrich", probe).await
        }
    }

    #[async_trait]
    impl HolderProfiler for ScriptedAnalyzers {
        async fn profile_token(
            &self,
            mint: &str,
            _top_n: u32,
            probe: &dyn ProgressProbe,
        ) -> Result<HolderProfilesResult, AnalyzerError> {
            self.step("holder-profiles", probe).await?;
            let profiles = self.inner.lock().profiles.clone();
            Ok(HolderProfilesResult {
                profiles: profiles
                    .into_iter()
                    .map(|wallet_address| HolderProfile {
                        wallet_address,
                        metrics: serde_json::Map::new(),
                    })
                    .collect(),
                token_mint: Some(mint.to_string()),
                generated_at_ms: 0,
            })
        }

        async fn profile_wallet(
            &self,
            wallet: &str,
            probe: &dyn ProgressProbe,
        ) -> Result<HolderProfilesResult, AnalyzerError> {
            self.step("holder-profiles", probe).await?;
            Ok(HolderProfilesResult {
                profiles: vec![HolderProfile {
                    wallet_address: wallet.to_string(),
                    metrics: serde_json::Map::new(),
                }],
                token_mint: None,
                generated_at_ms: 0,
            })
        }
    }
}
