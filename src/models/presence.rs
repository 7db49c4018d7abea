// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Presence records and the outcomes of presence transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{LedgerEntry, UserIdentity};
use std::time::Duration;

/// A viewer currently in chat. Lives only in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    pub username: UserIdentity,
    pub join_time: DateTime<Utc>,
}

/// Result of a join event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginOutcome {
    /// A new session started.
    Joined,
    /// Already present; the join clock was left alone.
    AlreadyPresent,
    /// On the ignore list; nothing recorded.
    Ignored,
}

/// Mileage credited when a session closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Accrual {
    pub username: UserIdentity,
    /// Whole seconds the session lasted
    pub session_seconds: u64,
    /// Miles credited for this session
    pub miles: f64,
    /// Ledger total after the credit
    pub total_miles: f64,
}

/// A viewer's ledger entry and open session, read at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub username: UserIdentity,
    /// Absent for viewers never credited, or when the ledger read failed
    pub entry: Option<LedgerEntry>,
    /// Length of the open session so far
    pub session: Option<Duration>,
    /// Ledger total plus the open session's miles
    pub miles: f64,
}

/// Result of a part event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LogoutOutcome {
    Accrued(Accrual),
    Ignored,
}

/// Who receives a bonus grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "usernames", rename_all = "snake_case")]
pub enum BonusPopulation {
    /// Everyone currently present.
    #[default]
    Present,
    /// An explicit list of viewers, present or not.
    Users(Vec<String>),
}

/// Result of a bonus grant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BonusReport {
    pub granted: usize,
    pub failed: usize,
}

/// Result of flushing all sessions at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlushReport {
    /// Sessions taken out of the tracker
    pub drained: usize,
    /// Sessions whose miles were committed
    pub flushed: usize,
    /// Sessions whose ledger write failed
    pub failed: usize,
    /// Sessions still in flight when the time budget ran out
    pub abandoned: usize,
    /// Miles committed across all flushed sessions
    pub miles: f64,
}
