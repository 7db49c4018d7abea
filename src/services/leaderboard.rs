// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard: ledger totals plus live sessions, ranked.

use crate::models::{LeaderboardRow, LedgerEntry, UserIdentity};
use crate::services::mileage::MileageCalculator;
use crate::services::presence::PresenceTracker;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

/// Rank viewers by ledger total plus in-progress session miles.
///
/// Ordered by miles descending, then username ascending. Viewers flagged as
/// bots are left out. A present viewer with no ledger entry yet still ranks
/// on live miles alone.
pub fn rank(
    entries: &[LedgerEntry],
    live: &HashMap<UserIdentity, Duration>,
    calculator: &MileageCalculator,
    n: i64,
) -> Vec<LeaderboardRow> {
    if n <= 0 {
        return Vec::new();
    }

    let mut totals: HashMap<&UserIdentity, f64> = HashMap::with_capacity(entries.len());
    for entry in entries.iter().filter(|e| !e.is_bot) {
        let session = live
            .get(&entry.username)
            .map(|elapsed| calculator.session_miles(*elapsed, entry.is_subscriber))
            .unwrap_or(0.0);
        totals.insert(&entry.username, entry.miles + session);
    }

    let flagged: Vec<&UserIdentity> = entries
        .iter()
        .filter(|e| e.is_bot)
        .map(|e| &e.username)
        .collect();
    for (user, elapsed) in live {
        if totals.contains_key(user) || flagged.contains(&user) {
            continue;
        }
        totals.insert(user, calculator.session_miles(*elapsed, false));
    }

    let mut ranked: Vec<(&UserIdentity, f64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(b.0),
        other => other,
    });

    ranked
        .into_iter()
        .take(usize::try_from(n).unwrap_or(usize::MAX))
        .enumerate()
        .map(|(i, (username, miles))| LeaderboardRow {
            rank: i + 1,
            username: username.clone(),
            miles,
        })
        .collect()
}

/// The current top `n` viewers.
///
/// If the ledger cannot be scanned, ranks on live sessions alone.
pub async fn top_n(tracker: &PresenceTracker, n: i64) -> Vec<LeaderboardRow> {
    if n <= 0 {
        return Vec::new();
    }

    let (entries, live) = tracker.standings().await;
    let entries = match entries {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Ledger scan failed, ranking live sessions only");
            Vec::new()
        }
    };

    rank(&entries, &live, tracker.calculator(), n)
}
