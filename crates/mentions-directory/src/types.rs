//! Core types for directory records.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A GitLab user as returned by the users and group-members APIs.
///
/// Identity is the numeric `id`: a user whose username or display name
/// changed between fetches is still the same user. Unknown JSON fields in
/// the API payload are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable numeric identifier.
    pub id: u64,
    /// Mention handle.
    pub username: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserRecord {
    /// Create a record without a display name.
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            name: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display name if present and not blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.trim().is_empty())
    }

    /// Text to show for this user: the display name, falling back to the username.
    pub fn label(&self) -> &str {
        self.display_name().unwrap_or(&self.username)
    }
}

impl PartialEq for UserRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for UserRecord {}

impl Hash for UserRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.display_name() {
            Some(name) => write!(f, "{} ({})", self.username, name),
            None => f.write_str(&self.username),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_id() {
        let before = UserRecord::new(7, "jdoe").with_name("John Doe");
        let after = UserRecord::new(7, "john.doe");
        assert_eq!(before, after);
        assert_ne!(before, UserRecord::new(8, "jdoe"));
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let json = r#"{
            "id": 42,
            "username": "alice",
            "name": "Alice Liddell",
            "state": "active",
            "avatar_url": "https://example.com/a.png",
            "access_level": 30
        }"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.username, "alice");
        assert_eq!(user.name.as_deref(), Some("Alice Liddell"));
    }

    #[test]
    fn test_deserialize_without_name() {
        let user: UserRecord = serde_json::from_str(r#"{"id": 1, "username": "bob"}"#).unwrap();
        assert_eq!(user.name, None);
        assert_eq!(user.label(), "bob");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            UserRecord::new(1, "alice").with_name("Alice").to_string(),
            "alice (Alice)"
        );
        assert_eq!(UserRecord::new(1, "alice").with_name("  ").to_string(), "alice");
    }
}
