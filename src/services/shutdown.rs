// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shutdown reconciliation: credit every open session before exit.

use crate::models::{FlushReport, PresenceRecord};
use crate::services::presence::{PresenceTracker, MAX_CONCURRENT_LEDGER_OPS};
use crate::time_utils::Clock;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// Default time allowed for the final flush.
pub const DEFAULT_SHUTDOWN_BUDGET: Duration = Duration::from_secs(10);

/// Flushes open sessions into the ledger when the process stops.
pub struct ShutdownReconciler {
    tracker: Arc<PresenceTracker>,
    budget: Duration,
}

impl ShutdownReconciler {
    pub fn new(tracker: Arc<PresenceTracker>, budget: Duration) -> Self {
        Self { tracker, budget }
    }

    /// Drain the tracker and credit every session.
    ///
    /// New joins are refused from the moment the drain happens. The budget
    /// covers waiting for the presence lock as well as the ledger writes;
    /// writes still running when it expires are abandoned and counted as
    /// such. Calling this again finds nothing to flush.
    pub async fn flush_all(&self) -> FlushReport {
        let deadline = tokio::time::Instant::now() + self.budget;
        let Ok(records) = tokio::time::timeout_at(deadline, self.tracker.drain()).await else {
            tracing::error!(
                budget_secs = self.budget.as_secs(),
                "Presence lock still held at shutdown deadline, open sessions lost"
            );
            return FlushReport::default();
        };
        let now = self.tracker.ledger().clock().now();

        let mut report = FlushReport {
            drained: records.len(),
            ..FlushReport::default()
        };
        if records.is_empty() {
            tracing::info!("No open sessions to flush");
            return report;
        }

        tracing::info!(
            sessions = records.len(),
            budget_secs = self.budget.as_secs(),
            "Flushing open sessions"
        );

        let tracker = &self.tracker;
        let mut settled = stream::iter(records)
            .map(|record: PresenceRecord| async move { tracker.settle(record, now).await })
            .buffer_unordered(MAX_CONCURRENT_LEDGER_OPS);

        let mut flushed = 0;
        let mut failed = 0;
        let mut miles = 0.0;
        let run = async {
            while let Some(result) = settled.next().await {
                match result {
                    Ok(accrual) => {
                        flushed += 1;
                        miles += accrual.miles;
                    }
                    // settle has already logged the lost session
                    Err(_) => failed += 1,
                }
            }
        };
        let timed_out = tokio::time::timeout_at(deadline, run).await.is_err();

        report.flushed = flushed;
        report.failed = failed;
        report.miles = miles;
        report.abandoned = report.drained - flushed - failed;

        if timed_out {
            tracing::error!(
                flushed = report.flushed,
                failed = report.failed,
                abandoned = report.abandoned,
                "Shutdown budget exceeded, abandoning remaining sessions"
            );
        } else if report.failed > 0 {
            tracing::warn!(
                flushed = report.flushed,
                failed = report.failed,
                miles = report.miles,
                "Shutdown flush finished with failures"
            );
        } else {
            tracing::info!(
                flushed = report.flushed,
                miles = report.miles,
                "Shutdown flush complete"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::UserIdentity;
    use crate::services::ignore::IgnoreFilter;
    use crate::services::ledger::Ledger;
    use crate::services::mileage::MileageCalculator;
    use crate::time_utils::ManualClock;
    use chrono::{TimeZone, Utc};

    async fn setup(store: MemoryStore) -> (Arc<PresenceTracker>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
        ));
        let ledger = Ledger::open(Arc::new(store), clock.clone()).await.unwrap();
        let tracker = PresenceTracker::new(
            ledger,
            IgnoreFilter::default(),
            MileageCalculator::default(),
        );
        (Arc::new(tracker), clock)
    }

    #[tokio::test]
    async fn test_flush_credits_partial_session() {
        let (tracker, clock) = setup(MemoryStore::new()).await;
        tracker.record_login("alice").await.unwrap();
        clock.advance(Duration::from_secs(5 * 60));

        let reconciler = ShutdownReconciler::new(tracker.clone(), DEFAULT_SHUTDOWN_BUDGET);
        let report = reconciler.flush_all().await;

        assert_eq!(report.drained, 1);
        assert_eq!(report.flushed, 1);
        assert_eq!(report.miles, 0.5);
        assert_eq!(tracker.present_count().await, 0);

        let alice = UserIdentity::parse("alice").unwrap();
        let entry = tracker.ledger().current_total(&alice).await;
        assert_eq!(entry.miles, 0.5);
        assert_eq!(entry.visits, 1);
    }

    #[tokio::test]
    async fn test_second_flush_is_empty() {
        let (tracker, _) = setup(MemoryStore::new()).await;
        tracker.record_login("alice").await.unwrap();

        let reconciler = ShutdownReconciler::new(tracker, DEFAULT_SHUTDOWN_BUDGET);
        assert_eq!(reconciler.flush_all().await.drained, 1);
        assert_eq!(reconciler.flush_all().await, FlushReport::default());
    }

    #[tokio::test]
    async fn test_failed_writes_are_counted() {
        let store = MemoryStore::new();
        let (tracker, clock) = setup(store.clone()).await;
        tracker.record_login("alice").await.unwrap();
        tracker.record_login("bob").await.unwrap();
        clock.advance(Duration::from_secs(600));
        store.fail_commits(true);

        let reconciler = ShutdownReconciler::new(tracker.clone(), DEFAULT_SHUTDOWN_BUDGET);
        let report = reconciler.flush_all().await;

        assert_eq!(report.drained, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.abandoned, 0);
        assert_eq!(tracker.present_count().await, 0);
    }
}
