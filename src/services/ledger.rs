// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable mileage ledger.
//!
//! Every mutation is one read-modify-write transaction against the store:
//! read the viewer's entry (or start from zero), apply the change, write it
//! back, commit. Mutations for the same viewer are also serialized in-process
//! so backends without conflict detection never lose an update.

use crate::db::{namespaces, Store};
use crate::error::LedgerError;
use crate::models::{LedgerEntry, UserIdentity};
use crate::services::mileage::MileageCalculator;
use crate::time_utils::Clock;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const PROBE_KEY: &str = "__startup_probe__";

/// Handle to the ledger. Cheap to clone.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    locks: Arc<DashMap<UserIdentity, Arc<Mutex<()>>>>,
}

/// Administrative changes to one entry. `None` fields are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Amendment {
    /// New total, replacing the current one
    pub miles: Option<f64>,
    pub is_bot: Option<bool>,
    pub is_subscriber: Option<bool>,
}

impl Amendment {
    pub fn is_empty(&self) -> bool {
        self.miles.is_none() && self.is_bot.is_none() && self.is_subscriber.is_none()
    }
}

/// Totals across all entries.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LedgerSummary {
    pub users: usize,
    pub total_miles: f64,
}

impl Ledger {
    /// Open the ledger, checking that the store answers a read.
    pub async fn open(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Result<Self, LedgerError> {
        let mut txn = store
            .begin_transaction()
            .await
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        txn.get(namespaces::USER_MILES, PROBE_KEY)
            .await
            .map_err(|e| LedgerError::StorageUnavailable(e.to_string()))?;
        drop(txn);

        Ok(Self {
            store,
            clock,
            locks: Arc::new(DashMap::new()),
        })
    }

    fn user_lock(&self, username: &UserIdentity) -> Arc<Mutex<()>> {
        self.locks.entry(username.clone()).or_default().clone()
    }

    /// Run one read-modify-write transaction for `username`.
    async fn mutate<F, R>(
        &self,
        username: &UserIdentity,
        f: F,
    ) -> Result<(LedgerEntry, R), LedgerError>
    where
        F: FnOnce(&mut LedgerEntry, DateTime<Utc>) -> R + Send,
        R: Send,
    {
        let lock = self.user_lock(username);
        let result = {
            let _guard = lock.lock().await;
            self.mutate_locked(username, f).await
        };

        // Forget the lock once nobody else holds or waits on it
        drop(lock);
        self.locks.remove_if(username, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn mutate_locked<F, R>(
        &self,
        username: &UserIdentity,
        f: F,
    ) -> Result<(LedgerEntry, R), LedgerError>
    where
        F: FnOnce(&mut LedgerEntry, DateTime<Utc>) -> R + Send,
        R: Send,
    {
        let write_failed = |reason: String| LedgerError::WriteFailed {
            username: username.to_string(),
            reason,
        };

        let mut txn = self
            .store
            .begin_transaction()
            .await
            .map_err(|e| write_failed(e.to_string()))?;

        let now = self.clock.now();
        let mut entry = match txn
            .get(namespaces::USER_MILES, username.as_str())
            .await
            .map_err(|e| write_failed(e.to_string()))?
        {
            // A document we cannot decode is left untouched
            Some(value) => serde_json::from_value::<LedgerEntry>(value)
                .map_err(|e| write_failed(format!("undecodable entry: {}", e)))?,
            None => LedgerEntry::new(username.clone(), now),
        };

        let result = f(&mut entry, now);
        entry.touch(now);

        let value = serde_json::to_value(&entry).map_err(|e| write_failed(e.to_string()))?;
        txn.put(namespaces::USER_MILES, username.as_str(), value);
        txn.commit().await.map_err(|e| write_failed(e.to_string()))?;

        Ok((entry, result))
    }

    /// Add miles and visits to a viewer's totals.
    pub async fn accrue_miles(
        &self,
        username: &UserIdentity,
        delta_miles: f64,
        delta_visits: u32,
    ) -> Result<LedgerEntry, LedgerError> {
        validate_amount(delta_miles)?;
        let (entry, ()) = self
            .mutate(username, |entry, now| {
                entry.accrue(delta_miles, delta_visits, now)
            })
            .await?;
        Ok(entry)
    }

    /// Credit one finished session.
    ///
    /// The subscriber flag is read inside the transaction, so the multiplier
    /// matches the entry being written. Returns the entry and the miles
    /// credited.
    pub async fn accrue_session(
        &self,
        username: &UserIdentity,
        elapsed: Duration,
        calculator: &MileageCalculator,
    ) -> Result<(LedgerEntry, f64), LedgerError> {
        let calculator = *calculator;
        self.mutate(username, move |entry, now| {
            let miles = calculator.session_miles(elapsed, entry.is_subscriber);
            entry.accrue(miles, 1, now);
            miles
        })
        .await
    }

    /// Add a fixed bonus to a viewer's total.
    pub async fn apply_bonus(
        &self,
        username: &UserIdentity,
        amount: f64,
    ) -> Result<LedgerEntry, LedgerError> {
        validate_amount(amount)?;
        let (entry, ()) = self
            .mutate(username, |entry, now| entry.accrue(amount, 0, now))
            .await?;
        Ok(entry)
    }

    /// Administrative update: apply every set field in one transaction.
    pub async fn amend(
        &self,
        username: &UserIdentity,
        amendment: Amendment,
    ) -> Result<LedgerEntry, LedgerError> {
        if let Some(miles) = amendment.miles {
            validate_amount(miles)?;
        }
        let (entry, previous) = self
            .mutate(username, |entry, _| {
                if let Some(is_bot) = amendment.is_bot {
                    entry.is_bot = is_bot;
                }
                if let Some(is_subscriber) = amendment.is_subscriber {
                    entry.is_subscriber = is_subscriber;
                }
                amendment
                    .miles
                    .map(|miles| std::mem::replace(&mut entry.miles, miles))
            })
            .await?;

        if let Some(previous) = previous {
            tracing::warn!(
                username = %username,
                previous,
                miles = entry.miles,
                "Administrative mileage correction"
            );
        }
        Ok(entry)
    }

    /// Look up a viewer's entry.
    pub async fn find(&self, username: &UserIdentity) -> Result<Option<LedgerEntry>, LedgerError> {
        let mut txn = self
            .store
            .begin_transaction()
            .await
            .map_err(|e| LedgerError::ReadFailed(e.to_string()))?;

        txn.get(namespaces::USER_MILES, username.as_str())
            .await
            .map_err(|e| LedgerError::ReadFailed(e.to_string()))?
            .map(|value| {
                serde_json::from_value(value).map_err(|e| LedgerError::ReadFailed(e.to_string()))
            })
            .transpose()
    }

    /// A viewer's entry, or a zero entry if absent or unreadable.
    pub async fn current_total(&self, username: &UserIdentity) -> LedgerEntry {
        match self.find(username).await {
            Ok(Some(entry)) => entry,
            Ok(None) => LedgerEntry::new(username.clone(), self.clock.now()),
            Err(e) => {
                tracing::warn!(
                    username = %username,
                    error = %e,
                    "Ledger read failed, treating entry as absent"
                );
                LedgerEntry::new(username.clone(), self.clock.now())
            }
        }
    }

    /// Visit every entry. Undecodable documents are logged and skipped.
    pub async fn for_each<F>(&self, mut f: F) -> Result<(), LedgerError>
    where
        F: FnMut(&LedgerEntry) + Send,
    {
        let mut txn = self
            .store
            .begin_transaction()
            .await
            .map_err(|e| LedgerError::ReadFailed(e.to_string()))?;

        txn.for_each(namespaces::USER_MILES, &mut |key: &str, value: &serde_json::Value| {
            match serde_json::from_value::<LedgerEntry>(value.clone()) {
                Ok(entry) => f(&entry),
                Err(e) => tracing::warn!(key, error = %e, "Skipping undecodable ledger entry"),
            }
        })
        .await
        .map_err(|e| LedgerError::ReadFailed(e.to_string()))
    }

    /// All entries.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut entries = Vec::new();
        self.for_each(|entry| entries.push(entry.clone())).await?;
        Ok(entries)
    }

    /// Number of viewers and total miles on record.
    pub async fn summary(&self) -> Result<LedgerSummary, LedgerError> {
        let mut summary = LedgerSummary::default();
        self.for_each(|entry| {
            summary.users += 1;
            summary.total_miles += entry.miles;
        })
        .await?;
        Ok(summary)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

fn validate_amount(amount: f64) -> Result<(), LedgerError> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount(amount))
    }
}
