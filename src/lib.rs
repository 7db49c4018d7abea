// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Tripbot-Miles: viewer presence and mileage accrual for a live stream
//!
//! This crate tracks which viewers are in chat, turns their watch time into
//! miles on a durable ledger, and serves balances and the leaderboard.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::PresenceTracker;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub tracker: Arc<PresenceTracker>,
}
