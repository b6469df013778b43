//! GitLab member directory for @mention completion.
//!
//! This crate keeps an in-memory copy of a GitLab user listing (the members
//! of a group, or all active users) for fast local lookup while typing a
//! mention, and refreshes it from the REST API when it goes stale.
//!
//! ## Features
//!
//! - **Client**: page fetches with token header, fixed timeouts and status classification
//! - **Pager**: all-or-nothing listing assembly with a page cap
//! - **Cache**: immutable snapshots swapped atomically, lock-free reads
//! - **Coordinator**: single-flight, TTL-gated refresh that never blanks a good cache
//! - **Query**: prefix and substring matching with truncation
//! - **Mention**: `@handle` detection and completion proposals

pub mod cache;
mod client;
pub mod clock;
pub mod config;
mod coordinator;
mod error;
pub mod events;
pub mod mention;
mod pager;
pub mod query;
mod types;

pub use cache::{CacheSnapshot, MemberCache};
pub use client::{CONNECT_TIMEOUT, DirectoryClient, PRIVATE_TOKEN_HEADER, REQUEST_TIMEOUT, Resource};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DirectoryConfig, ListingScope, PAGE_SIZE, Settings, SettingsProvider, SharedSettings};
pub use coordinator::{MemberDirectory, RefreshCoordinator, RefreshCoordinatorBuilder, RefreshOutcome};
pub use error::{ConfigError, FetchError};
pub use events::{CredentialAlarm, DirectoryEvent, DirectoryEvents};
pub use mention::{Completion, MentionFragment, complete, mention_fragment};
pub use pager::{MAX_PAGES, Pager};
pub use query::MatchMode;
pub use types::UserRecord;
