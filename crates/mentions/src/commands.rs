//! One-shot commands.

use std::sync::Arc;

use miette::Result;
use tracing::{debug, info};

use mentions_directory::{
    Completion, DirectoryConfig, MemberDirectory, RefreshCoordinator, RefreshCoordinatorBuilder,
    Resource, Settings, SharedSettings, UserRecord, mention,
};

/// The process-wide directory: settings handle plus the coordinator that
/// owns the cache. Created once in `main` and dropped at exit.
pub struct Directory {
    pub settings: SharedSettings,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl Directory {
    pub fn new(settings: Settings) -> Result<Self> {
        let settings = SharedSettings::new(settings);
        let coordinator = RefreshCoordinatorBuilder::new(Arc::new(settings.clone()))
            .build()
            .map_err(|e| miette::miette!("failed to create GitLab client: {}", e))?;
        Ok(Self {
            settings,
            coordinator: Arc::new(coordinator),
        })
    }

    pub fn config(&self) -> DirectoryConfig {
        self.coordinator.config()
    }
}

/// Message for a successful reload.
pub fn fetched_message(count: usize, config: &DirectoryConfig) -> String {
    match RefreshCoordinator::resolve_resource(config) {
        Ok(Resource::GroupMembers { group_id }) => {
            format!("Fetched {} members for group ID {}.", count, group_id)
        }
        _ => format!("Fetched {} active users.", count),
    }
}

/// Header line plus a preview of the first `preview` cached members.
pub fn cached_summary(members: &[UserRecord], config: &DirectoryConfig, preview: usize) -> String {
    let mut out = match RefreshCoordinator::resolve_resource(config) {
        Ok(Resource::GroupMembers { group_id }) => {
            format!("Group Members Cached: {} (group {})\n", members.len(), group_id)
        }
        _ => format!("Active Users Cached: {}\n", members.len()),
    };

    let shown = preview.min(members.len());
    if shown > 0 {
        out.push_str(&format!("\n-- Preview (first {}) --\n", shown));
        for user in &members[..shown] {
            out.push('@');
            out.push_str(&user.username);
            if let Some(name) = user.display_name() {
                out.push_str("  ");
                out.push_str(name);
            }
            out.push('\n');
        }
        if members.len() > shown {
            out.push_str("...\n");
        }
    }
    out
}

pub async fn fetch(directory: &Directory) -> Result<()> {
    let count = directory.coordinator.force_reload().await;
    if count == 0 {
        return Err(miette::miette!(
            "Failed to fetch users (0 fetched). Check token and settings."
        ));
    }
    println!("{}", fetched_message(count, &directory.config()));
    Ok(())
}

pub async fn show(directory: &Directory, preview: usize) -> Result<()> {
    directory.coordinator.ensure_loaded().await;
    print_cached(directory, preview);
    Ok(())
}

/// Print whatever is cached right now, without loading.
pub fn print_cached(directory: &Directory, preview: usize) {
    let snapshot = directory.coordinator.snapshot();
    print!(
        "{}",
        cached_summary(&snapshot.members, &directory.config(), preview)
    );
}

/// Completion proposals for `text`, or none when `file` names a document
/// that does not take mentions.
pub async fn proposals(
    directory: &Directory,
    text: &str,
    caret: usize,
    file: Option<&str>,
) -> Vec<Completion> {
    if let Some(file) = file.filter(|f| !mention::is_mention_document(f)) {
        debug!(file, "not a mention document");
        return Vec::new();
    }
    mention::complete(directory.coordinator.as_ref(), text, caret).await
}

pub async fn complete(
    directory: &Directory,
    text: &str,
    caret: Option<usize>,
    file: Option<&str>,
) -> Result<()> {
    let caret = caret.unwrap_or_else(|| text.chars().count());
    let proposals = proposals(directory, text, caret, file).await;
    if proposals.is_empty() {
        info!("no matching members");
    }
    for proposal in proposals {
        println!("{}\t{}\t{}", proposal.insert, proposal.label, proposal.type_text);
    }
    Ok(())
}

pub async fn search(directory: &Directory, query: &str) -> Result<()> {
    for user in directory.coordinator.search(query).await {
        println!("@{}", user);
    }
    Ok(())
}

/// Change one setting in place. The next refresh picks it up.
pub fn apply_setting(settings: &SharedSettings, key: &str, value: &str) -> Result<()> {
    match key {
        "url" => settings.modify(|s| s.host_url = value.to_string()),
        "token" => settings.modify(|s| s.private_token = value.to_string()),
        "group" => settings.modify(|s| s.group_id = value.to_string()),
        "scope" => settings.modify(|s| s.set_scope(value)),
        "ttl" => settings.modify(|s| s.set_cache_ttl(value)),
        "max" => settings.modify(|s| s.set_max_users_per_query(value)),
        "match" => settings.modify(|s| s.set_match_mode(value)),
        _ => {
            return Err(miette::miette!(
                "unknown setting '{}', expected url/token/group/scope/ttl/max/match",
                key
            ));
        }
    }
    Ok(())
}

/// One-line view of the current settings, token hidden.
pub fn settings_summary(settings: &SharedSettings) -> String {
    let current = settings.load();
    format!(
        "url={} group={} scope={:?} ttl={}s max={} match={:?} token={}",
        current.host_url,
        current.group_id,
        current.scope,
        current.cache_ttl_secs,
        current.max_users_per_query,
        current.match_mode,
        if current.private_token.trim().is_empty() { "unset" } else { "set" },
    )
}
