//! In-memory cache of directory members.
//!
//! Holds exactly one [`CacheSnapshot`] behind an [`ArcSwap`]. Readers load
//! the current `Arc` without locking and keep a consistent view for as long
//! as they hold it; writers swap in a whole new snapshot. A snapshot is
//! either empty or the complete result of one successful fetch.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::types::UserRecord;

/// Immutable listing plus the time it was fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Members in the order the pages arrived.
    pub members: Vec<UserRecord>,
    /// Epoch seconds of the fetch; 0 when empty.
    pub fetched_at: i64,
}

impl CacheSnapshot {
    pub fn new(members: Vec<UserRecord>, fetched_at: i64) -> Self {
        Self {
            members,
            fetched_at,
        }
    }

    /// The never-fetched (or cleared) snapshot.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True if empty, or older than `ttl_secs` at `now`.
    pub fn is_stale(&self, ttl_secs: u64, now: i64) -> bool {
        if self.is_empty() {
            return true;
        }
        let age = now.saturating_sub(self.fetched_at);
        age > i64::try_from(ttl_secs).unwrap_or(i64::MAX)
    }
}

/// Thread-safe holder of the current snapshot.
#[derive(Debug)]
pub struct MemberCache {
    current: ArcSwap<CacheSnapshot>,
}

impl MemberCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(CacheSnapshot::empty()),
        }
    }

    /// Current snapshot. Never blocks.
    pub fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.current.load_full()
    }

    /// Install a freshly fetched listing.
    ///
    /// Empty input is refused and the current snapshot is kept, so a failed
    /// or empty fetch can never blank a good cache. Returns whether the swap
    /// happened.
    pub fn replace(&self, members: Vec<UserRecord>, fetched_at: i64) -> bool {
        if members.is_empty() {
            debug!("refusing to replace member cache with an empty listing");
            return false;
        }
        let count = members.len();
        self.current
            .store(Arc::new(CacheSnapshot::new(members, fetched_at)));
        debug!(count, fetched_at, "member cache replaced");
        true
    }

    /// Reset to the empty snapshot.
    pub fn clear(&self) {
        self.current.store(Arc::new(CacheSnapshot::empty()));
        debug!("member cache cleared");
    }

    /// See [`CacheSnapshot::is_stale`].
    pub fn is_stale(&self, ttl_secs: u64, now: i64) -> bool {
        self.current.load().is_stale(ttl_secs, now)
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

impl Default for MemberCache {
    fn default() -> Self {
        Self::new()
    }
}
