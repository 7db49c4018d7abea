// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod entry;
pub mod identity;
pub mod leaderboard;
pub mod presence;

pub use entry::LedgerEntry;
pub use identity::{IdentityError, UserIdentity};
pub use leaderboard::LeaderboardRow;
pub use presence::{
    Accrual, Balance, BonusPopulation, BonusReport, FlushReport, LoginOutcome, LogoutOutcome,
    PresenceRecord,
};
