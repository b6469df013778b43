//! Error types for the member directory.

use thiserror::Error;

/// Errors that can occur when fetching from the GitLab directory.
///
/// None of these cross the coordinator's public surface: the pager and
/// coordinator absorb them into empty results or an unchanged cache.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The token is missing, expired, or lacks access (HTTP 401/403).
    #[error("unauthorized ({status})")]
    Unauthorized { status: u16 },

    /// Any other non-2xx response.
    #[error("request failed ({status})")]
    RequestFailed { status: u16 },

    /// Network failure or timeout.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not a list of users.
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The configured host URL could not be turned into a request URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The settings do not allow a fetch (e.g. group scope without a group id).
    #[error("configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl FetchError {
    /// Network, timeout and body-decoding failures.
    pub fn is_transport(&self) -> bool {
        matches!(self, FetchError::Http(_) | FetchError::Decode(_))
    }

    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Unauthorized { status } | FetchError::RequestFailed { status } => {
                Some(*status)
            }
            FetchError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
