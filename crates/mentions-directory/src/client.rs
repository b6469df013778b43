//! GitLab REST client for user listings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tracing::{debug, warn};

use crate::config::DirectoryConfig;
use crate::events::CredentialAlarm;
use crate::{FetchError, UserRecord};

/// Header carrying a GitLab personal access token.
pub const PRIVATE_TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// TCP connect timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Whole-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A paginated listing on the GitLab API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// `/groups/{id}/members/all`, including inherited members.
    GroupMembers { group_id: String },
    /// `/users?active=true`.
    ActiveUsers,
}

impl Resource {
    /// URL of one page of this listing under `base_url`.
    pub fn page_url(&self, base_url: &str, page: u32, per_page: usize) -> Result<Url, FetchError> {
        let mut url = match self {
            Resource::GroupMembers { group_id } => {
                api_url(base_url, &["groups", group_id, "members", "all"])?
            }
            Resource::ActiveUsers => {
                let mut url = api_url(base_url, &["users"])?;
                url.query_pairs_mut().append_pair("active", "true");
                url
            }
        };
        url.query_pairs_mut()
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }

    /// Short label for logs and messages.
    pub fn label(&self) -> &'static str {
        match self {
            Resource::GroupMembers { .. } => "group members",
            Resource::ActiveUsers => "active users",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::GroupMembers { group_id } => write!(f, "group members of {}", group_id),
            Resource::ActiveUsers => f.write_str("active users"),
        }
    }
}

/// Build `{base_url}/api/v4/{segments..}`, percent-encoding each segment.
///
/// A group path such as `org/team` stays one segment (`org%2Fteam`).
fn api_url(base_url: &str, segments: &[&str]) -> Result<Url, FetchError> {
    let mut url = Url::parse(base_url)?;
    url.path_segments_mut()
        .map_err(|()| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
        .pop_if_empty()
        .extend(["api", "v4"])
        .extend(segments);
    Ok(url)
}

/// Client for the GitLab users and group-members endpoints.
///
/// Cheap to clone; clones share the connection pool and the credential alarm.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http: Client,
    alarm: Arc<CredentialAlarm>,
}

impl DirectoryClient {
    /// Create a client that reports rejected tokens to `alarm`.
    pub fn new(alarm: Arc<CredentialAlarm>) -> Result<Self, FetchError> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, alarm })
    }

    /// Fetch one page of `resource`.
    pub async fn fetch_page(
        &self,
        resource: &Resource,
        page: u32,
        per_page: usize,
        config: &DirectoryConfig,
    ) -> Result<Vec<UserRecord>, FetchError> {
        let url = resource.page_url(&config.base_url, page, per_page)?;
        debug!(%resource, page, per_page, "fetching directory page");
        self.get_users(url, config).await
    }

    /// Ad hoc server-side user search, outside the cache.
    pub async fn search_users(
        &self,
        query: &str,
        limit: usize,
        config: &DirectoryConfig,
    ) -> Result<Vec<UserRecord>, FetchError> {
        let mut url = api_url(&config.base_url, &["users"])?;
        url.query_pairs_mut()
            .append_pair("search", query)
            .append_pair("per_page", &limit.to_string());
        debug!(query, limit, "searching directory");
        self.get_users(url, config).await
    }

    async fn get_users(
        &self,
        url: Url,
        config: &DirectoryConfig,
    ) -> Result<Vec<UserRecord>, FetchError> {
        let mut request = self.http.get(url);
        if let Some(token) = &config.token {
            request = request.header(PRIVATE_TOKEN_HEADER, token);
        }
        let response = request.send().await?;
        self.handle_response(response).await
    }

    /// Classify the status and decode the user list.
    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<Vec<UserRecord>, FetchError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            self.alarm.trip();
            return Err(FetchError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            warn!(status = status.as_u16(), url = %response.url(), "directory request failed");
            return Err(FetchError::RequestFailed {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
