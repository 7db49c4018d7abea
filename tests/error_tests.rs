// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use tripbot_miles::error::{AppError, LedgerError, TrackerError};
use tripbot_miles::models::UserIdentity;

fn status_of(err: impl Into<AppError>) -> StatusCode {
    err.into().into_response().status()
}

#[test]
fn test_tracker_errors_map_to_status() {
    assert_eq!(
        status_of(TrackerError::ShuttingDown("alice".to_string())),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(
        status_of(TrackerError::LogoutWithoutLogin("alice".to_string())),
        StatusCode::NOT_FOUND
    );

    let invalid = UserIdentity::parse("").unwrap_err();
    assert_eq!(
        status_of(TrackerError::InvalidIdentity(invalid)),
        StatusCode::BAD_REQUEST
    );
}

#[test]
fn test_ledger_errors_map_to_status() {
    let write_failed = LedgerError::WriteFailed {
        username: "alice".to_string(),
        reason: "commit failed".to_string(),
    };
    assert_eq!(status_of(write_failed), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        status_of(LedgerError::InvalidAmount(-1.0)),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_of(TrackerError::Ledger(LedgerError::ReadFailed("x".to_string()))),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_write_failure_names_user() {
    let err = LedgerError::WriteFailed {
        username: "alice".to_string(),
        reason: "disk full".to_string(),
    };
    assert_eq!(err.to_string(), "Ledger write failed for alice: disk full");
}
