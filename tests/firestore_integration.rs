// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ledger against the Firestore emulator.
//!
//! Run with FIRESTORE_EMULATOR_HOST set; skipped otherwise.

use std::sync::Arc;
use std::time::Duration;
use tripbot_miles::models::UserIdentity;
use tripbot_miles::services::{
    IgnoreFilter, Ledger, MileageCalculator, PresenceTracker, ShutdownReconciler,
};

mod common;
use common::{test_clock, test_db};

/// Unique per run so reruns against one emulator don't see old totals.
fn unique_user(prefix: &str) -> UserIdentity {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    UserIdentity::parse(&format!("{}_{}", prefix, nanos)).unwrap()
}

#[tokio::test]
async fn test_accrue_and_read_back() {
    require_emulator!();

    let clock = test_clock();
    let ledger = Ledger::open(Arc::new(test_db().await), clock)
        .await
        .expect("Ledger should open");
    let user = unique_user("alice");

    ledger.accrue_miles(&user, 1.5, 1).await.unwrap();
    ledger.apply_bonus(&user, 2.0).await.unwrap();

    let entry = ledger.find(&user).await.unwrap().expect("Entry should exist");
    assert_eq!(entry.miles, 3.5);
    assert_eq!(entry.visits, 1);
}

#[tokio::test]
async fn test_concurrent_accruals_not_lost() {
    require_emulator!();

    let ledger = Ledger::open(Arc::new(test_db().await), test_clock())
        .await
        .unwrap();
    let user = unique_user("racer");

    let mut handles = vec![];
    for _ in 0..10 {
        let ledger = ledger.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            ledger.accrue_miles(&user, 1.0, 1).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().expect("Accrual should succeed");
    }

    let entry = ledger.current_total(&user).await;
    assert_eq!(entry.miles, 10.0);
    assert_eq!(entry.visits, 10);
}

#[tokio::test]
async fn test_shutdown_flush_reaches_firestore() {
    require_emulator!();

    let clock = test_clock();
    let ledger = Ledger::open(Arc::new(test_db().await), clock.clone())
        .await
        .unwrap();
    let tracker = Arc::new(PresenceTracker::new(
        ledger,
        IgnoreFilter::default(),
        MileageCalculator::default(),
    ));
    let user = unique_user("viewer");

    tracker.record_login(user.as_str()).await.unwrap();
    clock.advance(Duration::from_secs(5 * 60));
    let report = ShutdownReconciler::new(tracker.clone(), Duration::from_secs(30))
        .flush_all()
        .await;
    assert_eq!(report.flushed, 1);

    let entry = tracker.ledger().current_total(&user).await;
    assert_eq!(entry.miles, 0.5);
}
