// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error types for the ledger, the presence tracker, and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::models::IdentityError;

/// Failures of the durable ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The storage transaction could not commit; the increment is lost.
    #[error("Ledger write failed for {username}: {reason}")]
    WriteFailed { username: String, reason: String },

    #[error("Ledger read failed: {0}")]
    ReadFailed(String),

    /// The store did not answer the startup probe.
    #[error("Storage unavailable at startup: {0}")]
    StorageUnavailable(String),

    #[error("Invalid mileage amount: {0}")]
    InvalidAmount(f64),
}

/// Failures of presence transitions and queries.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    InvalidIdentity(#[from] IdentityError),

    /// A part arrived for someone we never saw join.
    #[error("Logout without login for {0}")]
    LogoutWithoutLogin(String),

    #[error("Shutting down, login refused for {0}")]
    ShuttingDown(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Service is shutting down")]
    ShuttingDown,

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount(amount) => {
                AppError::BadRequest(format!("invalid amount {}", amount))
            }
            other => AppError::Ledger(other.to_string()),
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::InvalidIdentity(e) => AppError::BadRequest(e.to_string()),
            TrackerError::LogoutWithoutLogin(user) => {
                AppError::NotFound(format!("{} is not present", user))
            }
            TrackerError::ShuttingDown(_) => AppError::ShuttingDown,
            TrackerError::Ledger(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "shutting_down", None),
            AppError::Ledger(msg) => {
                tracing::error!(error = %msg, "Ledger error");
                (StatusCode::INTERNAL_SERVER_ERROR, "ledger_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
