// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Leaderboard rows for API responses.

use serde::Serialize;

use crate::models::UserIdentity;

/// One ranked viewer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardRow {
    /// 1-based position
    pub rank: usize,
    pub username: UserIdentity,
    /// Ledger total plus any in-progress session
    pub miles: f64,
}
