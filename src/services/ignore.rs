// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Accounts that never earn miles.

use std::collections::HashSet;

/// The bot itself, the channel owner, and well-known viewer-list bots.
///
/// See https://twitchinsights.net/bots
pub const DEFAULT_IGNORED_USERS: &[&str] = &[
    "adanalife_",
    "tripbot4000",
    "nightbot",
    "anotherttvviewer",
    "apricotdrupefruit",
    "avocadobadado",
    "commanderroot",
    "communityshowcase",
    "electricallongboard",
    "eubyt",
    "feuerwehr",
    "freddyybot",
    "jobi_essen",
    "logviewer",
    "lurxx",
    "p0lizei_",
    "slocool",
    "taormina2600",
    "unixchat",
    "v_and_k",
    "virgoproz",
    "zanekyber",
];

/// Case-insensitive exclusion set.
#[derive(Debug, Clone)]
pub struct IgnoreFilter {
    names: HashSet<String>,
}

impl Default for IgnoreFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_USERS.iter().copied())
    }
}

impl IgnoreFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names
            .into_iter()
            .map(|n| normalize(n.as_ref()))
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// The default list plus `extra`.
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        filter.names.extend(
            extra
                .into_iter()
                .map(|n| normalize(n.as_ref()))
                .filter(|n| !n.is_empty()),
        );
        filter
    }

    pub fn is_ignored(&self, username: &str) -> bool {
        self.names.contains(&normalize(username))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn normalize(name: &str) -> String {
    let name = name.trim();
    name.strip_prefix('@').unwrap_or(name).to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_list_is_case_insensitive() {
        let filter = IgnoreFilter::default();
        assert!(filter.is_ignored("nightbot"));
        assert!(filter.is_ignored("NightBot"));
        assert!(filter.is_ignored("@TripBot4000"));
        assert!(!filter.is_ignored("alice"));
    }

    #[test]
    fn test_with_extra_keeps_defaults() {
        let filter = IgnoreFilter::with_extra(["ModBot", " "]);
        assert!(filter.is_ignored("modbot"));
        assert!(filter.is_ignored("nightbot"));
        assert_eq!(filter.len(), DEFAULT_IGNORED_USERS.len() + 1);
    }

    #[test]
    fn test_empty_filter_ignores_nobody() {
        let filter = IgnoreFilter::new(Vec::<String>::new());
        assert!(filter.is_empty());
        assert!(!filter.is_ignored("nightbot"));
    }
}
