// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable per-viewer mileage totals.
//!
//! One document per viewer, keyed by the normalized username. Only
//! cumulative totals are kept; individual sessions are not recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::UserIdentity;

/// Cumulative mileage for one viewer.
///
/// Stored at: `user_miles/{username}`
///
/// Accrual only ever adds to `miles` and `visits`; the single exception is an
/// administrative correction through the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Normalized username (also used as document ID)
    pub username: UserIdentity,

    // ─── Totals ──────────────────────────────────────────────────
    /// Total miles earned, fractional
    #[serde(default)]
    pub miles: f64,
    /// Number of completed sessions
    #[serde(default)]
    pub visits: u32,

    // ─── Timestamps ──────────────────────────────────────────────
    /// When the entry was created
    pub first_seen: DateTime<Utc>,
    /// Last time the entry was written
    pub last_seen: DateTime<Utc>,

    // ─── Flags ───────────────────────────────────────────────────
    /// Known bot accounts are kept off the leaderboard
    #[serde(default)]
    pub is_bot: bool,
    /// Subscribers earn a session multiplier
    #[serde(default)]
    pub is_subscriber: bool,
}

impl LedgerEntry {
    /// A zero-valued entry, as if the viewer had never accrued anything.
    pub fn new(username: UserIdentity, now: DateTime<Utc>) -> Self {
        Self {
            username,
            miles: 0.0,
            visits: 0,
            first_seen: now,
            last_seen: now,
            is_bot: false,
            is_subscriber: false,
        }
    }

    /// Add accrued miles and visits.
    ///
    /// Callers validate that `miles` is finite and non-negative.
    pub fn accrue(&mut self, miles: f64, visits: u32, now: DateTime<Utc>) {
        self.miles += miles;
        self.visits = self.visits.saturating_add(visits);
        self.touch(now);
    }

    /// Stamp `last_seen`, never moving it backwards.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, minute, 0).unwrap()
    }

    #[test]
    fn test_accrue_adds_and_stamps() {
        let mut entry = LedgerEntry::new(UserIdentity::parse("alice").unwrap(), at(0));
        entry.accrue(1.5, 1, at(15));

        assert_eq!(entry.miles, 1.5);
        assert_eq!(entry.visits, 1);
        assert_eq!(entry.first_seen, at(0));
        assert_eq!(entry.last_seen, at(15));
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut entry = LedgerEntry::new(UserIdentity::parse("alice").unwrap(), at(30));
        entry.touch(at(10));
        assert_eq!(entry.last_seen, at(30));
    }

    #[test]
    fn test_missing_fields_default() {
        let json = serde_json::json!({
            "username": "bob",
            "first_seen": "2024-01-15T10:00:00Z",
            "last_seen": "2024-01-15T10:00:00Z"
        });
        let entry: LedgerEntry = serde_json::from_value(json).unwrap();
        assert_eq!(entry.miles, 0.0);
        assert_eq!(entry.visits, 0);
        assert!(!entry.is_bot);
        assert!(!entry.is_subscriber);
    }
}
