// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn release_and_extend_are_owner_checked() {
    // The CAS scripts must read the current owner before mutating.
    assert!(LOCK_RELEASE.contains("GET"));
    assert!(LOCK_RELEASE.contains("ARGV[1]"));
    assert!(LOCK_EXTEND.contains("GET"));
    assert!(LOCK_EXTEND.contains("PEXPIRE"));
}

#[test]
fn add_detects_terminal_collisions() {
    assert!(ADD.contains("'terminal'"));
    assert!(ADD.contains("'existing'"));
    assert!(ADD.contains("'enqueued'"));
}

#[test]
fn reserve_promotes_delayed_before_popping() {
    let promote = RESERVE.find("ZRANGEBYSCORE").unwrap();
    let pop = RESERVE.find("ZPOPMIN").unwrap();
    assert!(promote < pop);
}

#[test]
fn reserve_consumes_an_attempt() {
    assert!(RESERVE.contains("HINCRBY"));
    assert!(RESERVE.contains("attemptsMade"));
}

#[test]
fn stall_requeue_hands_back_the_attempt() {
    assert!(STALLED.contains("'attemptsMade', -1"));
    assert!(STALLED.contains("job stalled more than allowable limit"));
}

#[test]
fn terminal_transitions_start_with_the_active_zrem_guard() {
    // Exactly-once hinges on ZREM being the first (and deciding) step.
    for script in [COMPLETE, FAIL] {
        let guard = script.find("ZREM").unwrap();
        let write = script.find("HSET").unwrap();
        assert!(guard < write);
    }
}

#[test]
fn cache_invalidation_deletes_corrupt_entries() {
    assert!(CACHE_INVALIDATE_WALLET.contains("pcall(cjson.decode"));
    assert!(CACHE_INVALIDATE_WALLET.contains("walletAddress"));
}
