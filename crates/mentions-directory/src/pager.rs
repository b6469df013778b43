//! Page-by-page assembly of a complete listing.
//!
//! GitLab does not reliably report a total, so the end of a listing is
//! inferred: an empty page, or a page shorter than the requested size. The
//! result is all-or-nothing; an error on any page discards the pages already
//! fetched, since callers treat a non-empty listing as a complete one.

use tracing::{debug, info, warn};

use crate::client::{DirectoryClient, Resource};
use crate::config::DirectoryConfig;
use crate::{FetchError, UserRecord};

/// Upper bound on pages fetched for one listing.
pub const MAX_PAGES: u32 = 1000;

/// Drives a [`DirectoryClient`] across the pages of a listing.
#[derive(Debug, Clone)]
pub struct Pager {
    client: DirectoryClient,
    max_pages: u32,
}

impl Pager {
    pub fn new(client: DirectoryClient) -> Self {
        Self {
            client,
            max_pages: MAX_PAGES,
        }
    }

    /// Override the page cap.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn client(&self) -> &DirectoryClient {
        &self.client
    }

    /// Fetch the whole listing. Any failure yields an empty list.
    pub async fn fetch_all(&self, resource: &Resource, config: &DirectoryConfig) -> Vec<UserRecord> {
        match self.try_fetch_all(resource, config).await {
            Ok(users) => {
                info!(count = users.len(), %resource, "fetched directory listing");
                users
            }
            Err(e) => {
                warn!(error = %e, %resource, "directory fetch failed, discarding partial listing");
                Vec::new()
            }
        }
    }

    /// Fetch the whole listing, keeping the error that stopped it.
    pub async fn try_fetch_all(
        &self,
        resource: &Resource,
        config: &DirectoryConfig,
    ) -> Result<Vec<UserRecord>, FetchError> {
        let per_page = config.page_size;
        let mut all = Vec::new();

        for page in 1..=self.max_pages {
            let users = self
                .client
                .fetch_page(resource, page, per_page, config)
                .await
                .inspect_err(|e| debug!(page, error = %e, "page fetch failed"))?;

            if users.is_empty() {
                break;
            }
            let last = users.len() < per_page;
            all.extend(users);
            if last {
                break;
            }
            if page == self.max_pages {
                warn!(max_pages = self.max_pages, %resource, "page cap reached, stopping");
            }
        }

        Ok(all)
    }
}
