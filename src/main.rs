// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Tripbot-Miles API Server
//!
//! Receives join, part and bonus events from the chat gateway, tracks who is
//! watching, and credits watch time to each viewer's mileage.

use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tripbot_miles::{
    config::{Config, StorageBackend},
    db::{FirestoreStore, MemoryStore, Store},
    services::{IgnoreFilter, Ledger, MileageCalculator, PresenceTracker, ShutdownReconciler},
    time_utils::SystemClock,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting Tripbot-Miles API");

    // Open the ledger; the process must not run without one
    let store = open_store(&config).await?;
    let ledger = Ledger::open(store, Arc::new(SystemClock))
        .await
        .context("Ledger storage unavailable")?;

    match ledger.summary().await {
        Ok(summary) => tracing::info!(
            users = summary.users,
            total_miles = summary.total_miles,
            "Ledger opened"
        ),
        Err(e) => tracing::warn!(error = %e, "Ledger opened, summary unavailable"),
    }

    let ignore = IgnoreFilter::with_extra(&config.extra_ignored_users);
    tracing::info!(ignored = ignore.len(), "Ignore list loaded");

    let calculator = MileageCalculator::new(config.minutes_per_mile, config.subscriber_multiplier);
    let tracker = Arc::new(PresenceTracker::new(ledger, ignore, calculator));

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        tracker: tracker.clone(),
    });

    // Build router
    let app = tripbot_miles::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler())
        .await?;

    // Credit everyone still watching before exit
    let report = ShutdownReconciler::new(tracker, config.shutdown_budget)
        .flush_all()
        .await;
    tracing::info!(
        drained = report.drained,
        flushed = report.flushed,
        failed = report.failed,
        abandoned = report.abandoned,
        "Shutdown complete"
    );
    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory ledger, miles are lost on exit");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File => {
            tracing::info!(path = %config.ledger_path, "Opening ledger file");
            Arc::new(
                MemoryStore::open(&config.ledger_path)
                    .await
                    .context("Failed to open ledger file")?,
            )
        }
        StorageBackend::Firestore => Arc::new(
            FirestoreStore::new(&config.gcp_project_id)
                .await
                .context("Failed to connect to Firestore")?,
        ),
    };
    Ok(store)
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal_handler() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("Shutdown signal received, closing server");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("tripbot_miles=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
