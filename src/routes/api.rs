// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public read-only queries: balances and the leaderboard.

use crate::error::Result;
use crate::models::LeaderboardRow;
use crate::services::leaderboard;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Public routes (no authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/miles/{username}", get(get_miles))
        .route("/api/leaderboard", get(get_leaderboard))
}

// ─── Balance ─────────────────────────────────────────────────

/// A viewer's balance, including any session in progress.
#[derive(Serialize)]
pub struct MilesResponse {
    pub username: String,
    pub miles: f64,
    pub visits: u32,
    pub present: bool,
    /// Length of the open session so far, 0 if absent
    pub session_seconds: u64,
    /// Last ledger write, absent for viewers never credited
    pub last_seen: Option<String>,
}

async fn get_miles(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<MilesResponse>> {
    let balance = state.tracker.balance(&username).await?;
    let entry = balance.entry.as_ref();

    Ok(Json(MilesResponse {
        username: balance.username.to_string(),
        miles: balance.miles,
        visits: entry.map_or(0, |e| e.visits),
        present: balance.session.is_some(),
        session_seconds: balance.session.map_or(0, |d| d.as_secs()),
        last_seen: entry.map(|e| format_utc_rfc3339(e.last_seen)),
    }))
}

// ─── Leaderboard ─────────────────────────────────────────────

#[derive(Deserialize, Validate)]
struct LeaderboardQuery {
    #[serde(default = "default_n")]
    #[validate(range(max = 100))]
    n: i64,
}

fn default_n() -> i64 {
    3
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardRow>,
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    params.validate()?;

    let entries = leaderboard::top_n(&state.tracker, params.n).await;
    Ok(Json(LeaderboardResponse { entries }))
}
