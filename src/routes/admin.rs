// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrative ledger corrections.

use crate::error::{AppError, Result};
use crate::models::{LedgerEntry, UserIdentity};
use crate::services::Amendment;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/admin/users/{username}", put(update_user))
}

/// Fields left out are not changed.
#[derive(Deserialize, Validate)]
pub struct UserUpdate {
    /// New total, replacing the current one
    #[validate(range(min = 0.0))]
    pub miles: Option<f64>,
    pub is_bot: Option<bool>,
    pub is_subscriber: Option<bool>,
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<LedgerEntry>> {
    update.validate()?;

    let user = UserIdentity::parse(&username).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if state.tracker.ignore_filter().is_ignored(user.as_str()) {
        return Err(AppError::BadRequest(format!("{} is ignored", user)));
    }
    let amendment = Amendment {
        miles: update.miles,
        is_bot: update.is_bot,
        is_subscriber: update.is_subscriber,
    };
    if amendment.is_empty() {
        return Err(AppError::BadRequest("no fields to update".to_string()));
    }

    let entry = state.tracker.ledger().amend(&user, amendment).await?;
    Ok(Json(entry))
}
