// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP and realtime-channel DTOs.
//!
//! Everything here is camelCase JSON, matching the upstream API surface
//! consumed by the dashboard.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod request;
mod response;
mod ws;

pub use request::{
    DashboardAnalysisRequest, EnrichBalancesRequest, HolderProfilesTokenRequest,
    HolderProfilesWalletRequest, SimilarityQueueRequest,
};
pub use response::{
    ErrorBody, JobCounts, JobDetail, JobListEntry, JobProgressView, JobResultView,
    QueueJobResponse, QueueJobsResponse, QueueStatsResponse,
};
pub use ws::{ClientMessage, ServerMessage};
