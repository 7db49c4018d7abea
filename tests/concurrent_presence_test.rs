// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Concurrent, unordered join/part events must never double-credit a
//! session or lose one.

use std::sync::Arc;
use std::time::Duration;
use tripbot_miles::db::MemoryStore;
use tripbot_miles::models::{LogoutOutcome, UserIdentity};
use tripbot_miles::services::ShutdownReconciler;

mod common;
use common::{test_clock, test_tracker, tracker_over, GatedStore};

const NUM_VIEWERS: usize = 25;
const DUPLICATE_EVENTS: usize = 4;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_parts_credit_once() {
    let clock = test_clock();
    let tracker = test_tracker(MemoryStore::new(), clock.clone()).await;

    tracker.record_login("alice").await.unwrap();
    clock.advance(Duration::from_secs(10 * 60));

    let mut handles = vec![];
    for _ in 0..DUPLICATE_EVENTS {
        let tracker = tracker.clone();
        handles.push(tokio::spawn(async move {
            tracker.record_logout("alice").await
        }));
    }

    let mut accrued = 0;
    for handle in handles {
        if let Ok(LogoutOutcome::Accrued(_)) = handle.await.unwrap() {
            accrued += 1;
        }
    }
    assert_eq!(accrued, 1);

    let alice = UserIdentity::parse("alice").unwrap();
    let entry = tracker.ledger().current_total(&alice).await;
    assert_eq!(entry.miles, 1.0);
    assert_eq!(entry.visits, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_and_parts() {
    let clock = test_clock();
    let tracker = test_tracker(MemoryStore::new(), clock.clone()).await;

    let mut joins = vec![];
    for i in 0..NUM_VIEWERS {
        for _ in 0..DUPLICATE_EVENTS {
            let tracker = tracker.clone();
            joins.push(tokio::spawn(async move {
                tracker.record_login(&format!("viewer{}", i)).await
            }));
        }
    }
    for handle in joins {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(tracker.present_count().await, NUM_VIEWERS);

    clock.advance(Duration::from_secs(20 * 60));

    let mut parts = vec![];
    for i in 0..NUM_VIEWERS {
        let tracker = tracker.clone();
        parts.push(tokio::spawn(async move {
            tracker.record_logout(&format!("viewer{}", i)).await
        }));
    }
    for handle in parts {
        handle.await.unwrap().unwrap();
    }

    let summary = tracker.ledger().summary().await.unwrap();
    assert_eq!(summary.users, NUM_VIEWERS);
    assert_eq!(summary.total_miles, 2.0 * NUM_VIEWERS as f64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parts_racing_shutdown_credit_once() {
    let clock = test_clock();
    let tracker = test_tracker(MemoryStore::new(), clock.clone()).await;

    for i in 0..NUM_VIEWERS {
        tracker.record_login(&format!("viewer{}", i)).await.unwrap();
    }
    clock.advance(Duration::from_secs(10 * 60));

    let mut parts = vec![];
    for i in 0..NUM_VIEWERS {
        let tracker = tracker.clone();
        parts.push(tokio::spawn(async move {
            tracker.record_logout(&format!("viewer{}", i)).await
        }));
    }

    let reconciler = ShutdownReconciler::new(Arc::clone(&tracker), Duration::from_secs(10));
    let report = reconciler.flush_all().await;

    let mut parted = 0;
    for handle in parts {
        if handle.await.unwrap().is_ok() {
            parted += 1;
        }
    }

    // Every viewer was credited exactly once, by a part or by the flush
    assert_eq!(parted + report.flushed, NUM_VIEWERS);
    let summary = tracker.ledger().summary().await.unwrap();
    assert_eq!(summary.users, NUM_VIEWERS);
    assert_eq!(summary.total_miles, NUM_VIEWERS as f64);
    assert_eq!(tracker.present_count().await, 0);
}

#[tokio::test]
async fn test_part_during_balance_read_is_counted_once() {
    let clock = test_clock();
    let store = GatedStore::new(MemoryStore::new());
    let tracker = tracker_over(Arc::new(store.clone()), clock.clone()).await;
    let alice = UserIdentity::parse("alice").unwrap();
    tracker.ledger().accrue_miles(&alice, 2.0, 1).await.unwrap();
    tracker.record_login("alice").await.unwrap();
    clock.advance(Duration::from_secs(10 * 60));

    // Stall the ledger read, then let a part race it
    store.hold_next();
    let read = tokio::spawn({
        let tracker = tracker.clone();
        async move { tracker.balance("alice").await }
    });
    store.wait_held().await;

    let part = tokio::spawn({
        let tracker = tracker.clone();
        async move { tracker.record_logout("alice").await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    store.release();

    let balance = read.await.unwrap().unwrap();
    part.await.unwrap().unwrap();

    assert_eq!(balance.miles, 3.0);
    assert_eq!(balance.session, Some(Duration::from_secs(10 * 60)));
    assert_eq!(tracker.current_miles("alice").await.unwrap(), 3.0);
}
