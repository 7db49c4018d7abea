// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tripbot_miles::config::Config;
use tripbot_miles::db::{FirestoreStore, MemoryStore, StorageError, Store, StoreTxn};
use tripbot_miles::routes::create_router;
use tripbot_miles::services::{IgnoreFilter, Ledger, MileageCalculator, PresenceTracker};
use tripbot_miles::time_utils::ManualClock;
use tripbot_miles::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreStore {
    FirestoreStore::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// A fixed starting instant for manual clocks.
#[allow(dead_code)]
pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
    ))
}

/// Tracker over `store` with the default ignore list and rate.
#[allow(dead_code)]
pub async fn test_tracker(store: MemoryStore, clock: Arc<ManualClock>) -> Arc<PresenceTracker> {
    tracker_over(Arc::new(store), clock).await
}

/// Tracker over any store.
#[allow(dead_code)]
pub async fn tracker_over(
    store: Arc<dyn Store>,
    clock: Arc<ManualClock>,
) -> Arc<PresenceTracker> {
    let ledger = Ledger::open(store, clock)
        .await
        .expect("Failed to open ledger");
    Arc::new(PresenceTracker::new(
        ledger,
        IgnoreFilter::default(),
        MileageCalculator::default(),
    ))
}

/// Memory store whose next transaction can be held back.
///
/// After `hold_next`, the next `begin_transaction` blocks until `release`;
/// every other transaction goes straight through.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct GatedStore {
    inner: MemoryStore,
    gate: Arc<Gate>,
}

#[derive(Default)]
struct Gate {
    armed: AtomicBool,
    held: Notify,
    release: Notify,
}

#[allow(dead_code)]
impl GatedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            gate: Arc::default(),
        }
    }

    pub fn hold_next(&self) {
        self.gate.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until a transaction is being held.
    pub async fn wait_held(&self) {
        self.gate.held.notified().await;
    }

    pub fn release(&self) {
        self.gate.release.notify_one();
    }
}

#[async_trait]
impl Store for GatedStore {
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTxn>, StorageError> {
        if self.gate.armed.swap(false, Ordering::SeqCst) {
            self.gate.held.notify_one();
            self.gate.release.notified().await;
        }
        self.inner.begin_transaction().await
    }
}

/// A test app with an in-memory ledger and a manual clock.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
}

#[allow(dead_code)]
pub async fn create_test_app() -> TestApp {
    let store = MemoryStore::new();
    let clock = test_clock();
    let tracker = test_tracker(store.clone(), clock.clone()).await;

    let state = Arc::new(AppState {
        config: Config::default(),
        tracker,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        clock,
    }
}

/// JSON request carrying the test event token.
#[allow(dead_code)]
pub fn authed_json(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            header::AUTHORIZATION,
            format!("Bearer {}", Config::default().event_token),
        )
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
