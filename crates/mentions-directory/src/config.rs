//! Directory settings.
//!
//! [`Settings`] is the raw, user-editable form (what a settings page or a
//! `.properties` file holds). [`DirectoryConfig`] is the normalized form a
//! single fetch runs against; it is resolved again from the current settings
//! on every refresh so edits take effect on the next fetch.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::query::MatchMode;

/// Host used when none is configured.
pub const DEFAULT_HOST_URL: &str = "https://gitlab.com";

/// Default cache time-to-live in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default number of users returned per query.
pub const DEFAULT_MAX_USERS_PER_QUERY: usize = 10;

/// Users requested per page. GitLab caps `per_page` at 100.
pub const PAGE_SIZE: usize = 100;

/// Which listing a refresh pages through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingScope {
    /// Group members when a group id is set, otherwise active users.
    #[default]
    Auto,
    /// Group members only; refreshing without a group id fetches nothing.
    Group,
    /// Active users, even when a group id is set.
    Users,
}

impl ListingScope {
    /// Parse a scope setting. Blank means [`ListingScope::Auto`].
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Some(Self::Auto),
            "group" | "groups" | "members" => Some(Self::Group),
            "users" | "active" | "active_users" => Some(Self::Users),
            _ => None,
        }
    }
}

/// User-editable settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host_url: String,
    pub private_token: String,
    pub group_id: String,
    pub scope: ListingScope,
    pub cache_ttl_secs: u64,
    pub max_users_per_query: usize,
    pub match_mode: MatchMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host_url: DEFAULT_HOST_URL.to_string(),
            private_token: String::new(),
            group_id: String::new(),
            scope: ListingScope::Auto,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_users_per_query: DEFAULT_MAX_USERS_PER_QUERY,
            match_mode: MatchMode::Prefix,
        }
    }
}

impl Settings {
    /// Read settings from a `.properties` file, starting from defaults.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut settings = Self::default();
        settings.apply_properties(&text);
        Ok(settings)
    }

    /// Parse `.properties` text on top of the defaults.
    pub fn from_properties(text: &str) -> Self {
        let mut settings = Self::default();
        settings.apply_properties(text);
        settings
    }

    /// Override fields with the keys present in `.properties` text.
    ///
    /// Recognized keys are `GITLAB_URL`, `GITLAB_TOKEN`, `GITLAB_GROUP_ID`,
    /// `GITLAB_CACHE_TTL`, `GITLAB_MAX_USERS_PER_QUERY`, `GITLAB_SCOPE` and
    /// `GITLAB_MATCH_MODE`. A `GITLAB_URL` containing `;` is the legacy
    /// composite form `url;ID=..;SCOPE=..;TOKEN=..`; separate keys win over
    /// values taken from it.
    pub fn apply_properties(&mut self, text: &str) {
        let props = parse_properties(text);
        let get = |key: &str| props.get(key).map(String::as_str).and_then(non_blank);

        if let Some(url) = get("GITLAB_URL") {
            if url.contains(';') {
                self.apply_composite_url(url);
            } else {
                self.host_url = url.to_string();
            }
        }
        if let Some(token) = get("GITLAB_TOKEN") {
            self.private_token = token.to_string();
        }
        if let Some(group_id) = get("GITLAB_GROUP_ID") {
            self.group_id = group_id.to_string();
        }
        if let Some(scope) = get("GITLAB_SCOPE") {
            self.set_scope(scope);
        }
        if let Some(ttl) = get("GITLAB_CACHE_TTL") {
            self.set_cache_ttl(ttl);
        }
        if let Some(max) = get("GITLAB_MAX_USERS_PER_QUERY") {
            self.set_max_users_per_query(max);
        }
        if let Some(mode) = get("GITLAB_MATCH_MODE") {
            self.set_match_mode(mode);
        }
    }

    fn apply_composite_url(&mut self, composite: &str) {
        let mut url = None;
        let mut token = None;
        let mut id = None;
        let mut scope = None;

        for part in composite.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            match part.find('=') {
                Some(eq) if eq > 0 => {
                    let value = part[eq + 1..].trim();
                    match part[..eq].trim().to_ascii_uppercase().as_str() {
                        "URL" => url = Some(value),
                        "TOKEN" => token = Some(value),
                        "ID" => id = Some(value),
                        "SCOPE" => scope = Some(value),
                        other => debug!(key = other, "ignoring unknown composite URL key"),
                    }
                }
                _ => url = Some(part),
            }
        }

        if let Some(url) = url.and_then(non_blank) {
            self.host_url = url.to_string();
        }
        if let Some(token) = token.and_then(non_blank) {
            self.private_token = token.to_string();
        }
        if let Some(id) = id {
            self.group_id = id.to_string();
        }
        if let Some(scope) = scope {
            self.set_scope(scope);
        }
    }

    /// Set the scope from text; unknown values are logged and ignored.
    pub fn set_scope(&mut self, value: &str) {
        match ListingScope::parse(value) {
            Some(scope) => self.scope = scope,
            None => warn!(value, "ignoring unknown listing scope"),
        }
    }

    /// Set the TTL from text; invalid values are ignored.
    pub fn set_cache_ttl(&mut self, value: &str) {
        match value.trim().parse::<i64>() {
            Ok(ttl) => self.cache_ttl_secs = ttl.max(0) as u64,
            Err(_) => warn!(value, "ignoring invalid cache TTL"),
        }
    }

    /// Set the per-query limit from text, clamped to at least 1; invalid values are ignored.
    pub fn set_max_users_per_query(&mut self, value: &str) {
        match value.trim().parse::<i64>() {
            Ok(max) => self.max_users_per_query = max.max(1) as usize,
            Err(_) => warn!(value, "ignoring invalid max users per query"),
        }
    }

    /// Set the match discipline from text; unknown values are logged and ignored.
    pub fn set_match_mode(&mut self, value: &str) {
        match MatchMode::parse(value) {
            Some(mode) => self.match_mode = mode,
            None => warn!(value, "ignoring unknown match mode"),
        }
    }
}

/// Normalized configuration for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub token: Option<String>,
    pub group_id: Option<String>,
    pub scope: ListingScope,
    pub ttl_secs: u64,
    pub max_results: usize,
    pub match_mode: MatchMode,
    pub page_size: usize,
}

impl DirectoryConfig {
    pub fn resolve(settings: &Settings) -> Self {
        Self {
            base_url: normalize_base_url(&settings.host_url),
            token: non_blank(&settings.private_token).map(str::to_string),
            group_id: non_blank(&settings.group_id).map(str::to_string),
            scope: settings.scope,
            ttl_secs: settings.cache_ttl_secs,
            max_results: settings.max_users_per_query.max(1),
            match_mode: settings.match_mode,
            page_size: PAGE_SIZE,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self::resolve(&Settings::default())
    }
}

/// Trim, default when blank, and drop trailing slashes.
pub fn normalize_base_url(base: &str) -> String {
    let base = match non_blank(base) {
        Some(b) => b,
        None => DEFAULT_HOST_URL,
    };
    base.trim_end_matches('/').to_string()
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    (!t.is_empty()).then_some(t)
}

/// Minimal `.properties` reader: `key=value` or `key: value` per line,
/// `#` and `!` comments. No line continuations or escapes.
fn parse_properties(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
        .filter_map(|line| {
            let sep = line.find(['=', ':'])?;
            let key = line[..sep].trim();
            (!key.is_empty()).then(|| (key.to_string(), line[sep + 1..].trim().to_string()))
        })
        .collect()
}

/// Source of the current settings. Read on every refresh.
pub trait SettingsProvider: Send + Sync {
    fn settings(&self) -> Settings;
}

impl SettingsProvider for Settings {
    fn settings(&self) -> Settings {
        self.clone()
    }
}

/// Hot-swappable settings shared between the host and the coordinator.
///
/// Reads are lock-free; [`SharedSettings::update`] replaces the whole value.
#[derive(Debug, Clone)]
pub struct SharedSettings {
    inner: Arc<ArcSwap<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// Current settings.
    pub fn load(&self) -> Arc<Settings> {
        self.inner.load_full()
    }

    /// Replace the settings.
    pub fn update(&self, settings: Settings) {
        self.inner.store(Arc::new(settings));
    }

    /// Edit a copy of the current settings and install it.
    pub fn modify(&self, f: impl FnOnce(&mut Settings)) {
        let mut next = Settings::clone(&self.inner.load());
        f(&mut next);
        self.update(next);
    }
}

impl Default for SharedSettings {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SettingsProvider for SharedSettings {
    fn settings(&self) -> Settings {
        Settings::clone(&self.load())
    }
}
