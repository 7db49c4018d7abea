// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Presence tracking: who is in chat right now, and since when.
//!
//! The tracker owns the only copy of the presence map. Every mutation runs
//! under one async lock, including the ledger write that closes a session,
//! so a record is removed and credited exactly once no matter how join and
//! part events interleave.

use crate::error::{LedgerError, TrackerError};
use crate::models::{
    Accrual, Balance, BonusPopulation, BonusReport, LedgerEntry, LoginOutcome, LogoutOutcome,
    PresenceRecord, UserIdentity,
};
use crate::services::ignore::IgnoreFilter;
use crate::services::ledger::Ledger;
use crate::services::mileage::MileageCalculator;
use crate::time_utils::{elapsed_between, Clock};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Bounded fan-out for bulk ledger writes.
pub(crate) const MAX_CONCURRENT_LEDGER_OPS: usize = 16;

struct PresenceState {
    present: HashMap<UserIdentity, DateTime<Utc>>,
    /// Cleared once shutdown has drained the map
    accepting: bool,
}

impl PresenceState {
    fn sessions(&self, now: DateTime<Utc>) -> HashMap<UserIdentity, Duration> {
        self.present
            .iter()
            .map(|(user, joined)| (user.clone(), elapsed_between(*joined, now)))
            .collect()
    }
}

/// Tracks present viewers and credits their sessions to the ledger.
pub struct PresenceTracker {
    state: Mutex<PresenceState>,
    ledger: Ledger,
    ignore: IgnoreFilter,
    calculator: MileageCalculator,
}

impl PresenceTracker {
    pub fn new(ledger: Ledger, ignore: IgnoreFilter, calculator: MileageCalculator) -> Self {
        Self {
            state: Mutex::new(PresenceState {
                present: HashMap::new(),
                accepting: true,
            }),
            ledger,
            ignore,
            calculator,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn calculator(&self) -> &MileageCalculator {
        &self.calculator
    }

    pub fn ignore_filter(&self) -> &IgnoreFilter {
        &self.ignore
    }

    fn now(&self) -> DateTime<Utc> {
        self.ledger.clock().now()
    }

    /// Start a session. Repeated joins leave the original join time alone.
    pub async fn record_login(&self, username: &str) -> Result<LoginOutcome, TrackerError> {
        if self.ignore.is_ignored(username) {
            tracing::debug!(username, "Ignoring join from excluded account");
            return Ok(LoginOutcome::Ignored);
        }
        let user = UserIdentity::parse(username)?;

        let mut state = self.state.lock().await;
        if !state.accepting {
            tracing::warn!(username = %user, "Join refused during shutdown");
            return Err(TrackerError::ShuttingDown(user.to_string()));
        }
        if state.present.contains_key(&user) {
            tracing::debug!(username = %user, "Duplicate join, already present");
            return Ok(LoginOutcome::AlreadyPresent);
        }

        let now = self.now();
        state.present.insert(user.clone(), now);
        tracing::info!(username = %user, present = state.present.len(), "Viewer joined");
        Ok(LoginOutcome::Joined)
    }

    /// End a session and credit its miles.
    ///
    /// The record is removed even if the ledger write fails; the viewer has
    /// left either way, and that session's miles are lost.
    pub async fn record_logout(&self, username: &str) -> Result<LogoutOutcome, TrackerError> {
        if self.ignore.is_ignored(username) {
            tracing::debug!(username, "Ignoring part from excluded account");
            return Ok(LogoutOutcome::Ignored);
        }
        let user = UserIdentity::parse(username)?;

        let mut state = self.state.lock().await;
        let Some(join_time) = state.present.remove(&user) else {
            tracing::warn!(username = %user, "Part without matching join");
            return Err(TrackerError::LogoutWithoutLogin(user.to_string()));
        };

        let record = PresenceRecord {
            username: user,
            join_time,
        };
        let accrual = self.settle(record, self.now()).await?;
        tracing::info!(
            username = %accrual.username,
            miles = accrual.miles,
            total_miles = accrual.total_miles,
            session_seconds = accrual.session_seconds,
            present = state.present.len(),
            "Viewer left"
        );
        Ok(LogoutOutcome::Accrued(accrual))
    }

    /// Credit a closed session to the ledger.
    pub(crate) async fn settle(
        &self,
        record: PresenceRecord,
        now: DateTime<Utc>,
    ) -> Result<Accrual, TrackerError> {
        let elapsed = elapsed_between(record.join_time, now);

        match self
            .ledger
            .accrue_session(&record.username, elapsed, &self.calculator)
            .await
        {
            Ok((entry, miles)) => Ok(Accrual {
                username: record.username,
                session_seconds: elapsed.as_secs(),
                miles,
                total_miles: entry.miles,
            }),
            Err(e) => {
                tracing::error!(
                    username = %record.username,
                    session_seconds = elapsed.as_secs(),
                    error = %e,
                    "Failed to credit session, miles lost"
                );
                Err(e.into())
            }
        }
    }

    /// Elapsed time of every open session.
    pub async fn snapshot(&self) -> HashMap<UserIdentity, Duration> {
        let state = self.state.lock().await;
        state.sessions(self.now())
    }

    /// Elapsed time of one viewer's open session, if any.
    pub async fn session_elapsed(&self, user: &UserIdentity) -> Option<Duration> {
        let state = self.state.lock().await;
        state
            .present
            .get(user)
            .map(|joined| elapsed_between(*joined, self.now()))
    }

    pub async fn present_count(&self) -> usize {
        self.state.lock().await.present.len()
    }

    /// A viewer's ledger entry and open session, read together.
    ///
    /// The presence lock is held across the ledger read, so a part event
    /// cannot commit between the two and the session is counted exactly
    /// once. A failed ledger read counts as an absent entry. Ignored
    /// accounts always have zero.
    pub async fn balance(&self, username: &str) -> Result<Balance, TrackerError> {
        let user = UserIdentity::parse(username)?;
        if self.ignore.is_ignored(user.as_str()) {
            return Ok(Balance {
                username: user,
                entry: None,
                session: None,
                miles: 0.0,
            });
        }

        let state = self.state.lock().await;
        let entry = match self.ledger.find(&user).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    username = %user,
                    error = %e,
                    "Ledger read failed, treating entry as absent"
                );
                None
            }
        };
        let session = state
            .present
            .get(&user)
            .map(|joined| elapsed_between(*joined, self.now()));
        drop(state);

        let (total, is_subscriber) = entry
            .as_ref()
            .map_or((0.0, false), |e| (e.miles, e.is_subscriber));
        let live = session
            .map(|elapsed| self.calculator.session_miles(elapsed, is_subscriber))
            .unwrap_or(0.0);

        Ok(Balance {
            username: user,
            entry,
            session,
            miles: total + live,
        })
    }

    /// Ledger total plus the open session, if any.
    pub async fn current_miles(&self, username: &str) -> Result<f64, TrackerError> {
        Ok(self.balance(username).await?.miles)
    }

    /// Every ledger entry and every open session, read together.
    ///
    /// Like [`balance`](Self::balance), the scan runs under the presence
    /// lock. The sessions are returned even if the scan fails.
    pub async fn standings(
        &self,
    ) -> (
        Result<Vec<LedgerEntry>, LedgerError>,
        HashMap<UserIdentity, Duration>,
    ) {
        let state = self.state.lock().await;
        let entries = self.ledger.entries().await;
        (entries, state.sessions(self.now()))
    }

    /// Grant `amount` miles to a population of viewers.
    ///
    /// For `Present` the population is read and granted under the presence
    /// lock, so nobody joining or leaving mid-grant is half-counted.
    pub async fn apply_bonus(
        &self,
        amount: f64,
        population: &BonusPopulation,
    ) -> Result<BonusReport, TrackerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidAmount(amount).into());
        }

        match population {
            BonusPopulation::Present => {
                let state = self.state.lock().await;
                let users: Vec<UserIdentity> = state.present.keys().cloned().collect();
                let report = self.grant(amount, users).await;
                drop(state);
                tracing::info!(
                    amount,
                    granted = report.granted,
                    failed = report.failed,
                    "Bonus granted to present viewers"
                );
                Ok(report)
            }
            BonusPopulation::Users(names) => {
                let mut users = Vec::with_capacity(names.len());
                for name in names {
                    if self.ignore.is_ignored(name) {
                        continue;
                    }
                    users.push(UserIdentity::parse(name)?);
                }
                users.sort();
                users.dedup();

                let report = self.grant(amount, users).await;
                tracing::info!(
                    amount,
                    granted = report.granted,
                    failed = report.failed,
                    "Bonus granted to listed viewers"
                );
                Ok(report)
            }
        }
    }

    async fn grant(&self, amount: f64, users: Vec<UserIdentity>) -> BonusReport {
        let results = stream::iter(users)
            .map(|user| async move {
                let result = self.ledger.apply_bonus(&user, amount).await;
                if let Err(e) = &result {
                    tracing::error!(username = %user, amount, error = %e, "Bonus grant failed");
                }
                result.is_ok()
            })
            .buffer_unordered(MAX_CONCURRENT_LEDGER_OPS)
            .collect::<Vec<bool>>()
            .await;

        let granted = results.iter().filter(|ok| **ok).count();
        BonusReport {
            granted,
            failed: results.len() - granted,
        }
    }

    /// Close admission and take every open session out of the map.
    ///
    /// Both happen in one critical section, so no join can slip in after the
    /// drain and no part can credit a drained session a second time.
    pub(crate) async fn drain(&self) -> Vec<PresenceRecord> {
        let mut state = self.state.lock().await;
        state.accepting = false;
        let mut records: Vec<PresenceRecord> = state
            .present
            .drain()
            .map(|(username, join_time)| PresenceRecord {
                username,
                join_time,
            })
            .collect();
        records.sort_by(|a, b| a.username.cmp(&b.username));
        records
    }

    pub async fn is_accepting(&self) -> bool {
        self.state.lock().await.accepting
    }
}
