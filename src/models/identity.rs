// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Case-insensitive viewer identity, the key for presence and ledger data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest accepted username, in bytes.
pub const MAX_USERNAME_LEN: usize = 64;

/// A normalized chat username.
///
/// Surrounding whitespace and a leading `@` are stripped and the name is
/// lowercased, so `@NightBot` and `nightbot` are the same identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserIdentity(String);

impl UserIdentity {
    /// Normalize and validate a raw username.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed);

        if name.is_empty() {
            return Err(IdentityError::Empty);
        }
        if name.len() > MAX_USERNAME_LEN {
            return Err(IdentityError::TooLong(name.len()));
        }
        if let Some(c) = name
            .chars()
            .find(|c| c.is_whitespace() || c.is_control() || *c == '/')
        {
            return Err(IdentityError::InvalidChar(c));
        }

        Ok(Self(name.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for UserIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UserIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserIdentity> for String {
    fn from(identity: UserIdentity) -> Self {
        identity.0
    }
}

/// Reasons a username is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("Username is empty")]
    Empty,

    #[error("Username is too long ({0} bytes)")]
    TooLong(usize),

    #[error("Username contains invalid character {0:?}")]
    InvalidChar(char),
}
