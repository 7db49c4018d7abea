// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Chat gateway events: joins, parts and bonus grants.
//!
//! Events are fire-and-forget from the gateway's side, so a part for a
//! viewer we never saw join is answered with 200 and `not_present`.

use crate::error::{Result, TrackerError};
use crate::models::{BonusPopulation, BonusReport, LoginOutcome, LogoutOutcome};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

/// Event routes (event token applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/join", post(join))
        .route("/events/part", post(part))
        .route("/events/bonus", post(bonus))
}

#[derive(Deserialize, Validate)]
pub struct PresenceEvent {
    #[validate(length(min = 1, max = 128))]
    pub username: String,
}

// ─── Join / Part ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct JoinResponse {
    pub outcome: LoginOutcome,
}

async fn join(
    State(state): State<Arc<AppState>>,
    Json(event): Json<PresenceEvent>,
) -> Result<Json<JoinResponse>> {
    event.validate()?;

    let outcome = state.tracker.record_login(&event.username).await?;
    Ok(Json(JoinResponse { outcome }))
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum PartResponse {
    Left(LogoutOutcome),
    NotPresent {
        outcome: &'static str,
        username: String,
    },
}

async fn part(
    State(state): State<Arc<AppState>>,
    Json(event): Json<PresenceEvent>,
) -> Result<Json<PartResponse>> {
    event.validate()?;

    match state.tracker.record_logout(&event.username).await {
        Ok(outcome) => Ok(Json(PartResponse::Left(outcome))),
        Err(TrackerError::LogoutWithoutLogin(username)) => Ok(Json(PartResponse::NotPresent {
            outcome: "not_present",
            username,
        })),
        Err(e) => Err(e.into()),
    }
}

// ─── Bonus ───────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct BonusEvent {
    #[validate(range(exclusive_min = 0.0, max = 1000000.0))]
    pub amount: f64,
    #[serde(default)]
    pub population: BonusPopulation,
}

async fn bonus(
    State(state): State<Arc<AppState>>,
    Json(event): Json<BonusEvent>,
) -> Result<Json<BonusReport>> {
    event.validate()?;

    let report = state
        .tracker
        .apply_bonus(event.amount, &event.population)
        .await?;
    Ok(Json(report))
}
