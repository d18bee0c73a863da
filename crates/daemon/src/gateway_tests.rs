// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn subscribe(id: &str) -> ClientMessage {
    ClientMessage::SubscribeToJob { job_id: id.to_string() }
}

fn unsubscribe(id: &str) -> ClientMessage {
    ClientMessage::UnsubscribeFromJob { job_id: id.to_string() }
}

#[test]
fn subscriptions_filter_by_job_id() {
    let mut set = SubscriptionSet::default();
    assert!(!set.wants(&JobId::new("job-a")));

    set.apply(subscribe("job-a"));
    assert!(set.wants(&JobId::new("job-a")));
    assert!(!set.wants(&JobId::new("job-b")));
}

#[test]
fn unsubscribe_stops_delivery() {
    let mut set = SubscriptionSet::default();
    set.apply(subscribe("job-a"));
    set.apply(unsubscribe("job-a"));
    assert!(!set.wants(&JobId::new("job-a")));
    assert!(set.is_empty());
}

#[test]
fn unsubscribing_an_unknown_job_is_harmless() {
    let mut set = SubscriptionSet::default();
    set.apply(unsubscribe("job-a"));
    assert!(set.is_empty());
}

#[test]
fn duplicate_subscriptions_collapse() {
    let mut set = SubscriptionSet::default();
    set.apply(subscribe("job-a"));
    set.apply(subscribe("job-a"));
    set.apply(unsubscribe("job-a"));
    assert!(!set.wants(&JobId::new("job-a")));
}
