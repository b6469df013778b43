//! Filtering of cached members by a typed fragment.
//!
//! Two matching disciplines are supported. Callers pick one through the
//! entry point they call, or through [`MatchMode`] from settings:
//!
//! - **prefix**: case-insensitive prefix of the username (mention completion)
//! - **substring**: case-insensitive substring of the username or display name
//!
//! Results are the first `max_results` matches in snapshot order. No ranking
//! is applied.

use serde::{Deserialize, Serialize};

use crate::cache::CacheSnapshot;
use crate::types::UserRecord;

/// Matching discipline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Username starts with the fragment.
    #[default]
    Prefix,
    /// Username or display name contains the fragment.
    Substring,
}

impl MatchMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prefix" => Some(Self::Prefix),
            "substring" | "contains" => Some(Self::Substring),
            _ => None,
        }
    }
}

/// Filter with the given discipline.
pub fn filter(
    query: &str,
    snapshot: &CacheSnapshot,
    max_results: usize,
    mode: MatchMode,
) -> Vec<UserRecord> {
    match mode {
        MatchMode::Prefix => filter_prefix(query, snapshot, max_results),
        MatchMode::Substring => filter_substring(query, snapshot, max_results),
    }
}

/// Members whose username starts with `prefix`, ignoring case.
pub fn filter_prefix(prefix: &str, snapshot: &CacheSnapshot, max_results: usize) -> Vec<UserRecord> {
    let needle = prefix.to_lowercase();
    collect_matching(snapshot, max_results, |user| {
        user.username.to_lowercase().starts_with(&needle)
    })
}

/// Members whose username or display name contains `fragment`, ignoring case.
pub fn filter_substring(
    fragment: &str,
    snapshot: &CacheSnapshot,
    max_results: usize,
) -> Vec<UserRecord> {
    let needle = fragment.to_lowercase();
    collect_matching(snapshot, max_results, |user| {
        user.username.to_lowercase().contains(&needle)
            || user
                .name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle))
    })
}

fn collect_matching(
    snapshot: &CacheSnapshot,
    max_results: usize,
    matches: impl Fn(&UserRecord) -> bool,
) -> Vec<UserRecord> {
    if snapshot.is_empty() {
        return Vec::new();
    }
    snapshot
        .members
        .iter()
        .filter(|user| !user.username.is_empty() && matches(user))
        .take(max_results.max(1))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn snapshot(users: Vec<UserRecord>) -> CacheSnapshot {
        CacheSnapshot::new(users, 1_700_000_000)
    }

    fn usernames(users: &[UserRecord]) -> Vec<&str> {
        users.iter().map(|u| u.username.as_str()).collect()
    }

    #[test]
    fn test_prefix_keeps_snapshot_order() {
        let snap = snapshot(vec![
            UserRecord::new(1, "alice"),
            UserRecord::new(2, "alibaba"),
            UserRecord::new(3, "bob"),
        ]);
        let found = filter_prefix("ali", &snap, 10);
        assert_eq!(usernames(&found), vec!["alice", "alibaba"]);
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        let snap = snapshot(vec![UserRecord::new(1, "Alice"), UserRecord::new(2, "MALICE")]);
        assert_eq!(usernames(&filter_prefix("aLI", &snap, 10)), vec!["Alice"]);
    }

    #[test]
    fn test_prefix_ignores_display_name() {
        let snap = snapshot(vec![UserRecord::new(1, "jsmith").with_name("Alice Smith")]);
        assert!(filter_prefix("ali", &snap, 10).is_empty());
    }

    #[test]
    fn test_substring_matches_username_or_name() {
        let snap = snapshot(vec![
            UserRecord::new(1, "jsmith").with_name("John Smith"),
            UserRecord::new(2, "asmall").with_name("Amy Small"),
            UserRecord::new(3, "bob").with_name("Bob Jones"),
        ]);
        let found = filter_substring("smi", &snap, 10);
        assert_eq!(usernames(&found), vec!["jsmith"]);

        let found = filter_substring("SMA", &snap, 10);
        assert_eq!(usernames(&found), vec!["asmall"]);
    }

    #[test]
    fn test_substring_matches_by_name_only() {
        let snap = snapshot(vec![
            UserRecord::new(1, "jsmith").with_name("John Smith"),
            UserRecord::new(2, "asmall").with_name("Amy Smithers"),
        ]);
        let found = filter_substring("smi", &snap, 10);
        assert_eq!(usernames(&found), vec!["jsmith", "asmall"]);
    }

    #[test]
    fn test_truncates_to_max_results() {
        let snap = snapshot((1..=20).map(|i| UserRecord::new(i, format!("user{i}"))).collect());
        let found = filter_prefix("user", &snap, 5);
        assert_eq!(usernames(&found), vec!["user1", "user2", "user3", "user4", "user5"]);
    }

    #[test]
    fn test_zero_limit_returns_one() {
        let snap = snapshot(vec![UserRecord::new(1, "alice"), UserRecord::new(2, "alex")]);
        assert_eq!(filter_prefix("al", &snap, 0).len(), 1);
    }

    #[test]
    fn test_empty_snapshot() {
        assert!(filter("a", &CacheSnapshot::empty(), 10, MatchMode::Prefix).is_empty());
        assert!(filter("a", &CacheSnapshot::empty(), 10, MatchMode::Substring).is_empty());
    }

    #[test]
    fn test_empty_query_matches_everything_up_to_limit() {
        let snap = snapshot(vec![UserRecord::new(1, "alice"), UserRecord::new(2, "bob")]);
        assert_eq!(filter("", &snap, 10, MatchMode::Prefix).len(), 2);
    }

    #[test]
    fn test_match_mode_parse() {
        assert_eq!(MatchMode::parse("Prefix"), Some(MatchMode::Prefix));
        assert_eq!(MatchMode::parse("contains"), Some(MatchMode::Substring));
        assert_eq!(MatchMode::parse("fuzzy"), None);
    }
}
