//! Refresh coordinator: single-flight, TTL-gated reloading of the member cache.
//!
//! Lifecycle of the listing: empty → loaded → stale → loaded → … with the
//! refresh itself as a critical section. At most one paginated fetch runs
//! per coordinator; callers arriving during a fetch wait for it and then
//! re-check staleness, so a burst of completion triggers costs one fetch.
//!
//! Settings are re-read on every call. Switching the group id (or scope)
//! changes which listing the next fetch pages through; the cache itself is
//! not keyed by listing.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info, warn};

use crate::cache::{CacheSnapshot, MemberCache};
use crate::client::{DirectoryClient, Resource};
use crate::clock::{Clock, SystemClock};
use crate::config::{DirectoryConfig, ListingScope, SettingsProvider};
use crate::events::{CredentialAlarm, DirectoryEvent, DirectoryEvents};
use crate::pager::{MAX_PAGES, Pager};
use crate::query::{self, MatchMode};
use crate::{FetchError, UserRecord};

/// Capability the editor layer relies on for mention completion.
///
/// `ensure_loaded` and `force_reload` may suspend the caller for a full
/// paginated fetch (bounded by request timeouts and the page cap). Prefer
/// `ensure_loaded` on latency-sensitive paths: it is a no-op while the cache
/// is fresh. Neither method reports errors; failures leave the previous
/// snapshot in place.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Refresh the listing if it is empty or older than the TTL.
    async fn ensure_loaded(&self);

    /// Refresh regardless of age. Returns the number of members installed,
    /// 0 if the fetch failed or returned nothing.
    async fn force_reload(&self) -> usize;

    /// Current listing. Never waits on a refresh.
    fn snapshot(&self) -> Arc<CacheSnapshot>;

    /// Cached members matching `fragment` under the configured discipline and limit.
    fn filter_members(&self, fragment: &str) -> Vec<UserRecord>;
}

/// Result of one pass through the refresh critical section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The cache was fresh; nothing was fetched.
    Fresh,
    /// A new listing with this many members was installed.
    Refreshed(usize),
    /// The fetch produced nothing; the previous listing was kept.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshPolicy {
    IfStale,
    Force,
}

/// Owner of the member cache and the only writer to it.
pub struct RefreshCoordinator {
    pager: Pager,
    cache: MemberCache,
    settings: Arc<dyn SettingsProvider>,
    clock: Arc<dyn Clock>,
    events: DirectoryEvents,
    refresh_lock: Mutex<()>,
}

impl RefreshCoordinator {
    /// Coordinator with the system clock and default page cap.
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Result<Self, FetchError> {
        RefreshCoordinatorBuilder::new(settings).build()
    }

    /// Current settings, normalized.
    pub fn config(&self) -> DirectoryConfig {
        DirectoryConfig::resolve(&self.settings.settings())
    }

    /// Subscribe to refresh, clear and credential events.
    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.events.subscribe()
    }

    /// Whether the current listing is due for a refresh.
    pub fn is_stale(&self) -> bool {
        self.cache
            .is_stale(self.config().ttl_secs, self.clock.now())
    }

    /// Drop the cached listing.
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("member cache cleared");
        self.events.emit(DirectoryEvent::Cleared);
    }

    /// Like [`MemberDirectory::ensure_loaded`], reporting what happened.
    pub async fn refresh_if_stale(&self) -> RefreshOutcome {
        self.refresh(RefreshPolicy::IfStale).await
    }

    /// Like [`MemberDirectory::force_reload`], reporting what happened.
    pub async fn reload(&self) -> RefreshOutcome {
        self.refresh(RefreshPolicy::Force).await
    }

    /// Filter the cached listing with an explicit discipline.
    pub fn filter_with(&self, fragment: &str, mode: MatchMode) -> Vec<UserRecord> {
        let config = self.config();
        query::filter(fragment, &self.cache.snapshot(), config.max_results, mode)
    }

    /// Server-side search, bypassing the cache. Failures yield an empty list.
    pub async fn search(&self, query: &str) -> Vec<UserRecord> {
        let config = self.config();
        match self
            .pager
            .client()
            .search_users(query, config.max_results, &config)
            .await
        {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, query, "user search failed");
                Vec::new()
            }
        }
    }

    /// Which listing the given settings select.
    pub fn resolve_resource(config: &DirectoryConfig) -> Result<Resource, FetchError> {
        match (config.scope, &config.group_id) {
            (ListingScope::Auto | ListingScope::Group, Some(group_id)) => {
                Ok(Resource::GroupMembers {
                    group_id: group_id.clone(),
                })
            }
            (ListingScope::Group, None) => Err(FetchError::ConfigurationMissing(
                "group id is not configured".to_string(),
            )),
            (ListingScope::Auto, None) | (ListingScope::Users, _) => Ok(Resource::ActiveUsers),
        }
    }

    async fn refresh(&self, policy: RefreshPolicy) -> RefreshOutcome {
        let _guard = self.refresh_lock.lock().await;

        let config = self.config();
        if policy == RefreshPolicy::IfStale && !self.cache.is_stale(config.ttl_secs, self.clock.now())
        {
            debug!("member cache is fresh, skipping refresh");
            return RefreshOutcome::Fresh;
        }

        let resource = match Self::resolve_resource(&config) {
            Ok(resource) => resource,
            Err(e) => {
                warn!(error = %e, "cannot refresh member cache");
                self.events
                    .emit(DirectoryEvent::RefreshFailed { resource: None });
                return RefreshOutcome::Failed;
            }
        };

        let members = self.pager.fetch_all(&resource, &config).await;
        let count = members.len();
        if self.cache.replace(members, self.clock.now()) {
            info!(count, %resource, "member cache refreshed");
            self.events.emit(DirectoryEvent::Refreshed { count, resource });
            RefreshOutcome::Refreshed(count)
        } else {
            if self.cache.is_empty() {
                warn!(%resource, "refresh returned no members, no listing available");
            } else {
                warn!(%resource, cached = self.cache.len(), "refresh returned no members, keeping previous listing");
            }
            self.events.emit(DirectoryEvent::RefreshFailed {
                resource: Some(resource),
            });
            RefreshOutcome::Failed
        }
    }
}

#[async_trait]
impl MemberDirectory for RefreshCoordinator {
    async fn ensure_loaded(&self) {
        self.refresh_if_stale().await;
    }

    async fn force_reload(&self) -> usize {
        match self.reload().await {
            RefreshOutcome::Refreshed(count) => count,
            RefreshOutcome::Fresh | RefreshOutcome::Failed => 0,
        }
    }

    fn snapshot(&self) -> Arc<CacheSnapshot> {
        self.cache.snapshot()
    }

    fn filter_members(&self, fragment: &str) -> Vec<UserRecord> {
        let config = self.config();
        query::filter(
            fragment,
            &self.cache.snapshot(),
            config.max_results,
            config.match_mode,
        )
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`RefreshCoordinator`] with optional collaborators.
pub struct RefreshCoordinatorBuilder {
    settings: Arc<dyn SettingsProvider>,
    clock: Option<Arc<dyn Clock>>,
    events: Option<DirectoryEvents>,
    alarm: Option<Arc<CredentialAlarm>>,
    max_pages: u32,
}

impl RefreshCoordinatorBuilder {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> Self {
        Self {
            settings,
            clock: None,
            events: None,
            alarm: None,
            max_pages: MAX_PAGES,
        }
    }

    /// Time source for TTL checks and the credential throttle.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Share an existing event channel.
    pub fn events(mut self, events: DirectoryEvents) -> Self {
        self.events = Some(events);
        self
    }

    /// Share a process-wide credential alarm instead of creating one.
    pub fn credential_alarm(mut self, alarm: Arc<CredentialAlarm>) -> Self {
        self.alarm = Some(alarm);
        self
    }

    /// Page cap per listing.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn build(self) -> Result<RefreshCoordinator, FetchError> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let events = self.events.unwrap_or_default();
        let alarm = self
            .alarm
            .unwrap_or_else(|| Arc::new(CredentialAlarm::new(Arc::clone(&clock), events.clone())));
        let pager = Pager::new(DirectoryClient::new(alarm)?).with_max_pages(self.max_pages);

        Ok(RefreshCoordinator {
            pager,
            cache: MemberCache::new(),
            settings: self.settings,
            clock,
            events,
            refresh_lock: Mutex::new(()),
        })
    }
}
