// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage layer: a transactional document store behind the ledger.
//!
//! Values are JSON documents addressed by `(namespace, key)`. The ledger
//! issues one transaction per mutation; a transaction dropped without
//! `commit` is rolled back.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

/// Namespace (collection) names as constants.
pub mod namespaces {
    /// Ledger entries, keyed by normalized username
    pub const USER_MILES: &str = "user_miles";
}

/// A document store that hands out transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a transaction.
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTxn>, StorageError>;
}

/// One unit of work against a [`Store`].
///
/// Reads see the transaction's own pending writes. Nothing is visible to
/// other transactions until `commit` succeeds.
#[async_trait]
pub trait StoreTxn: Send {
    /// Read one document.
    async fn get(&mut self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Stage a write.
    fn put(&mut self, namespace: &str, key: &str, value: Value);

    /// Visit every document in a namespace.
    async fn for_each(
        &mut self,
        namespace: &str,
        f: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v Value) + Send),
    ) -> Result<(), StorageError>;

    /// Apply all staged writes atomically.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage read failed: {0}")]
    Read(String),

    #[error("Storage commit failed: {0}")]
    Commit(String),
}
