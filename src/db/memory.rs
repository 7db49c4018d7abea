// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process document store, optionally persisted to a JSON file.
//!
//! Transactions are exclusive: `begin_transaction` takes the store lock and
//! holds it until the transaction is committed or dropped. With a backing
//! file, every commit rewrites the whole snapshot (temp file + rename) before
//! the new state becomes visible, so a failed write leaves the store as it
//! was.

use crate::db::{StorageError, Store, StoreTxn};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Documents = HashMap<String, BTreeMap<String, Value>>;

/// In-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    docs: Arc<Mutex<Documents>>,
    path: Option<PathBuf>,
    fail_reads: AtomicBool,
    fail_commits: AtomicBool,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a JSON file, creating the file if missing.
    ///
    /// Fails if the file cannot be parsed or written.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let docs: Documents = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                StorageError::Unavailable(format!("Corrupt ledger file {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Documents::new(),
            Err(e) => {
                return Err(StorageError::Unavailable(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        // Rewrite immediately so an unwritable path fails at startup
        persist(&path, &docs)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let count: usize = docs.values().map(BTreeMap::len).sum();
        tracing::info!(path = %path.display(), documents = count, "Opened file-backed store");

        Ok(Self {
            inner: Arc::new(Inner {
                docs: Arc::new(Mutex::new(docs)),
                path: Some(path),
                ..Inner::default()
            }),
        })
    }

    /// Make every subsequent read fail. For tests.
    pub fn fail_reads(&self, on: bool) {
        self.inner.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Make every subsequent commit fail. For tests.
    pub fn fail_commits(&self, on: bool) {
        self.inner.fail_commits.store(on, Ordering::SeqCst);
    }

    /// Number of committed documents in a namespace.
    pub async fn document_count(&self, namespace: &str) -> usize {
        self.inner
            .docs
            .lock()
            .await
            .get(namespace)
            .map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTxn>, StorageError> {
        let guard = self.inner.docs.clone().lock_owned().await;
        Ok(Box::new(MemoryTxn {
            guard,
            writes: Vec::new(),
            inner: self.inner.clone(),
        }))
    }
}

struct MemoryTxn {
    guard: OwnedMutexGuard<Documents>,
    writes: Vec<(String, String, Value)>,
    inner: Arc<Inner>,
}

impl MemoryTxn {
    fn check_reads(&self) -> Result<(), StorageError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read("injected read failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTxn for MemoryTxn {
    async fn get(&mut self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        self.check_reads()?;

        let pending = self
            .writes
            .iter()
            .rev()
            .find(|(ns, k, _)| ns == namespace && k == key)
            .map(|(_, _, v)| v.clone());
        if pending.is_some() {
            return Ok(pending);
        }

        Ok(self
            .guard
            .get(namespace)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    fn put(&mut self, namespace: &str, key: &str, value: Value) {
        self.writes
            .push((namespace.to_string(), key.to_string(), value));
    }

    async fn for_each(
        &mut self,
        namespace: &str,
        f: &mut (dyn for<'k, 'v> FnMut(&'k str, &'v Value) + Send),
    ) -> Result<(), StorageError> {
        self.check_reads()?;

        let mut view = self.guard.get(namespace).cloned().unwrap_or_default();
        for (ns, key, value) in &self.writes {
            if ns == namespace {
                view.insert(key.clone(), value.clone());
            }
        }

        for (key, value) in &view {
            f(key, value);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryTxn {
            mut guard,
            writes,
            inner,
        } = *self;

        if inner.fail_commits.load(Ordering::SeqCst) {
            return Err(StorageError::Commit("injected commit failure".to_string()));
        }
        if writes.is_empty() {
            return Ok(());
        }

        match &inner.path {
            Some(path) => {
                let mut next = guard.clone();
                apply(&mut next, writes);
                persist(path, &next).await?;
                *guard = next;
            }
            None => apply(&mut guard, writes),
        }
        Ok(())
    }
}

fn apply(docs: &mut Documents, writes: Vec<(String, String, Value)>) {
    for (namespace, key, value) in writes {
        docs.entry(namespace).or_default().insert(key, value);
    }
}

/// Write a snapshot next to `path`, then rename it into place.
async fn persist(path: &Path, docs: &Documents) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(docs)
        .map_err(|e| StorageError::Commit(format!("Failed to encode snapshot: {}", e)))?;

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &bytes)
        .await
        .map_err(|e| StorageError::Commit(format!("Failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StorageError::Commit(format!("Failed to replace {}: {}", path.display(), e)))?;
    Ok(())
}
