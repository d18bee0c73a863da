// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.
//!
//! Boot order: connect to the broker → orphan-lock sweep → start the
//! worker pool → serve the HTTP intake and the realtime gateway.
//! Shutdown: stop accepting connections, drain active handlers until
//! the deadline, abandon lingering leases for broker re-delivery.

use crate::http;
use crate::state::AppState;
use axum::http::HeaderValue;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use wq_broker::{
    connect, sweep_orphan_locks, RedisLocks, RedisProfilesCache, RedisQueues, RedisRuns,
};
use wq_core::SystemClock;
use wq_engine::{AnalyzerSet, Dispatcher, Handlers, ProgressBus, WorkerPool};

use super::{Config, LifecycleError};

/// Start the daemon and serve until interrupted.
pub async fn run(config: Config, analyzers: AnalyzerSet) -> Result<(), LifecycleError> {
    // 1. Broker connectivity first; nothing works without it.
    let conn = connect(&config.redis).await?;
    let queues = RedisQueues::new(conn.clone());
    let locks = RedisLocks::new(conn.clone());
    let cache = RedisProfilesCache::new(conn.clone());
    let runs = RedisRuns::new(conn);
    let clock = SystemClock;
    info!(url = %config.redis.url(), "broker connected");

    // 2. Orphan sweep, once, before any worker can race it.
    let report = sweep_orphan_locks(&queues, &locks).await?;
    if report.scanned > 0 {
        info!(
            scanned = report.scanned,
            released = report.released.len(),
            "orphan lock sweep complete"
        );
    }

    // 3. Workers.
    let bus = ProgressBus::default();
    let handlers = Handlers::new(
        analyzers,
        queues.clone(),
        runs.clone(),
        cache.clone(),
        clock.clone(),
    );
    let pool = WorkerPool::new(
        queues.clone(),
        locks.clone(),
        handlers,
        bus.clone(),
        clock.clone(),
        config.worker_options.clone(),
    );
    let shutdown = pool.shutdown_token();
    let worker_handles = pool.start();

    // 4. HTTP intake + realtime gateway.
    let state = Arc::new(AppState {
        dispatcher: Dispatcher::new(queues.clone(), locks, runs, clock),
        queues,
        bus,
    });
    let router = http::router(state).layer(cors_layer(config.frontend_url.as_deref()));
    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    info!(port = config.http_port, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // 5. Drain workers; run_queue enforces the drain deadline itself.
    shutdown.cancel();
    for handle in worker_handles {
        if handle.await.is_err() {
            warn!("worker task panicked during drain");
        }
    }
    info!("daemon stopped");
    Ok(())
}

/// CORS allow-list from `FRONTEND_URL`; permissive when unset (local
/// development).
fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    match frontend_url.and_then(|url| url.parse::<HeaderValue>().ok()) {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin))
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            warn!("ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };
    tokio::select! {
        _ = ctrl_c => info!("shutdown signal received"),
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
