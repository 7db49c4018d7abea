// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod ignore;
pub mod leaderboard;
pub mod ledger;
pub mod mileage;
pub mod presence;
pub mod shutdown;

pub use ignore::IgnoreFilter;
pub use ledger::{Amendment, Ledger, LedgerSummary};
pub use mileage::MileageCalculator;
pub use presence::PresenceTracker;
pub use shutdown::ShutdownReconciler;
