// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use crate::services::mileage::{DEFAULT_MINUTES_PER_MILE, DEFAULT_SUBSCRIBER_MULTIPLIER};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Where the ledger lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-process only, lost on exit
    Memory,
    /// JSON file on local disk
    File,
    /// Google Cloud Firestore
    Firestore,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" => Ok(Self::File),
            "firestore" => Ok(Self::Firestore),
            other => Err(ConfigError::Invalid("STORAGE_BACKEND", other.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Server port
    pub port: u16,
    /// Bearer token required on event and admin routes
    pub event_token: String,

    // --- Storage ---
    pub storage_backend: StorageBackend,
    /// Ledger file for the file backend
    pub ledger_path: String,
    /// GCP project ID for the Firestore backend
    pub gcp_project_id: String,

    // --- Accrual ---
    pub minutes_per_mile: f64,
    pub subscriber_multiplier: f64,
    /// Ignored on top of the built-in bot list
    pub extra_ignored_users: Vec<String>,

    /// Time allowed to flush open sessions on shutdown
    pub shutdown_budget: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            event_token: "test_event_token".to_string(),
            storage_backend: StorageBackend::Memory,
            ledger_path: "tripbot-miles.json".to_string(),
            gcp_project_id: "test-project".to_string(),
            minutes_per_mile: DEFAULT_MINUTES_PER_MILE,
            subscriber_multiplier: DEFAULT_SUBSCRIBER_MULTIPLIER,
            extra_ignored_users: Vec::new(),
            shutdown_budget: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let event_token = lookup("EVENT_TOKEN")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("EVENT_TOKEN"))?;

        let minutes_per_mile: f64 = parse_or(&lookup, "MINUTES_PER_MILE", DEFAULT_MINUTES_PER_MILE)?;
        if !minutes_per_mile.is_finite() || minutes_per_mile <= 0.0 {
            return Err(ConfigError::Invalid(
                "MINUTES_PER_MILE",
                minutes_per_mile.to_string(),
            ));
        }

        let subscriber_multiplier: f64 = parse_or(
            &lookup,
            "SUBSCRIBER_BONUS_MULTIPLIER",
            DEFAULT_SUBSCRIBER_MULTIPLIER,
        )?;
        if !subscriber_multiplier.is_finite() || subscriber_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "SUBSCRIBER_BONUS_MULTIPLIER",
                subscriber_multiplier.to_string(),
            ));
        }

        let extra_ignored_users = lookup("IGNORED_USERS")
            .map(|v| {
                v.split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8080)?,
            event_token,
            storage_backend: parse_or(&lookup, "STORAGE_BACKEND", StorageBackend::File)?,
            ledger_path: lookup("LEDGER_PATH").unwrap_or_else(|| "tripbot-miles.json".to_string()),
            gcp_project_id: lookup("GCP_PROJECT_ID").unwrap_or_else(|| "local-dev".to_string()),
            minutes_per_mile,
            subscriber_multiplier,
            extra_ignored_users,
            shutdown_budget: Duration::from_secs(parse_or(&lookup, "SHUTDOWN_BUDGET_SECS", 10)?),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
