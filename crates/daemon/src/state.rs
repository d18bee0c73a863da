// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared request-handling state.

use wq_broker::{LockAdapter, QueueAdapter, RunStore};
use wq_core::Clock;
use wq_engine::{Dispatcher, ProgressBus};

/// Constructor-wired dependencies behind every HTTP and WS handler.
pub struct AppState<Q, L, R, C>
where
    Q: QueueAdapter,
    L: LockAdapter,
    R: RunStore,
    C: Clock,
{
    pub dispatcher: Dispatcher<Q, L, R, C>,
    pub queues: Q,
    pub bus: ProgressBus,
}
