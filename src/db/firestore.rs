// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed document store.
//!
//! Reads go straight to Firestore. Writes are staged in memory and sent in
//! one Firestore transaction on commit, so either every staged document is
//! written or none is. Keys are URL-encoded to form document IDs.

use crate::db::{StorageError, Store, StoreTxn};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Option<firestore::FirestoreDb>,
}

/// A document as read back by a collection scan.
#[derive(Deserialize)]
struct KeyedDocument {
    #[serde(alias = "_firestore_id")]
    id: Option<String>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl FirestoreStore {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, StorageError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            StorageError::Unavailable(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, StorageError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            StorageError::Unavailable(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create an offline client. Every transaction fails to start.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    fn get_client(&self) -> Result<&firestore::FirestoreDb, StorageError> {
        self.client.as_ref().ok_or_else(|| {
            StorageError::Unavailable("Database not connected (offline mode)".to_string())
        })
    }
}

#[async_trait]
impl Store for FirestoreStore {
    async fn begin_transaction(&self) -> Result<Box<dyn StoreTxn>, StorageError> {
        let client = self.get_client()?.clone();
        Ok(Box::new(FirestoreTxn {
            client,
            writes: Vec::new(),
        }))
    }
}

struct FirestoreTxn {
    client: firestore::FirestoreDb,
    writes: Vec<(String, String, Value)>,
}

fn document_id(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

#[async_trait]
impl StoreTxn for FirestoreTxn {
    async fn get(&mut self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        if let Some((_, _, value)) = self
            .writes
            .iter()
            .rev()
            .find(|(ns, k, _)| ns == namespace && k == key)
        {
            return Ok(Some(value.clone()));
        }

        self.client
            .fluent()
            .select()
            .by_id_in(namespace)
            .obj::<Value>()
            .one(&document_id(key))
            .await
            .map_err(|e| StorageError::Read(e.to_string()))
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
        let documents: Vec<KeyedDocument> = self
            .client
            .fluent()
            .select()
            .from(namespace)
            .obj()
            .query()
            .await
            .map_err(|e| StorageError::Read(e.to_string()))?;

        let mut view = std::collections::BTreeMap::new();
        for doc in documents {
            let Some(id) = doc.id else {
                tracing::warn!(namespace, "Skipping document without ID");
                continue;
            };
            let key = urlencoding::decode(&id)
                .map(|k| k.into_owned())
                .unwrap_or(id);
            view.insert(key, Value::Object(doc.fields));
        }
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
        if self.writes.is_empty() {
            return Ok(());
        }

        let mut transaction = self
            .client
            .begin_transaction()
            .await
            .map_err(|e| StorageError::Commit(format!("Failed to begin transaction: {}", e)))?;

        for (namespace, key, value) in &self.writes {
            self.client
                .fluent()
                .update()
                .in_col(namespace)
                .document_id(document_id(key))
                .object(value)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    StorageError::Commit(format!(
                        "Failed to add {}/{} to transaction: {}",
                        namespace, key, e
                    ))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| StorageError::Commit(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(writes = self.writes.len(), "Firestore transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_escapes_separators() {
        assert_eq!(document_id("alice"), "alice");
        assert_eq!(document_id("a/b"), "a%2Fb");
    }

    #[tokio::test]
    async fn test_mock_store_refuses_transactions() {
        let store = FirestoreStore::new_mock();
        assert!(matches!(
            store.begin_transaction().await,
            Err(StorageError::Unavailable(_))
        ));
    }
}
