//! mentions: GitLab @mention directory from the command line.
//!
//! Stands in for an editor host. Subcommands:
//! - `fetch`: reload the member listing and report the count
//! - `show`: print the cached listing (loading it first if stale)
//! - `complete`: completion proposals for a line of text
//! - `search`: server-side user search, bypassing the cache
//! - `shell`: interactive completion prompt sharing one cache

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentions_directory::{ListingScope, MatchMode, Settings};

mod commands;
mod shell;

/// Settings file looked up under the user config dir when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "gitlab-mentions/application.properties";

fn parse_scope(s: &str) -> Result<ListingScope, String> {
    ListingScope::parse(s).ok_or_else(|| format!("invalid scope '{}', expected auto/group/users", s))
}

fn parse_match_mode(s: &str) -> Result<MatchMode, String> {
    MatchMode::parse(s).ok_or_else(|| format!("invalid match mode '{}', expected prefix/substring", s))
}

#[derive(Parser)]
#[command(name = "mentions")]
#[command(about = "GitLab @mention directory", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: SettingsArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Connection and cache settings. Flags override the properties file.
#[derive(Args, Debug, Default, Clone)]
struct SettingsArgs {
    /// Properties file with GITLAB_* keys
    #[arg(long, global = true, env = "GITLAB_MENTIONS_CONFIG")]
    config: Option<PathBuf>,

    /// GitLab host URL
    #[arg(long, global = true, env = "GITLAB_URL")]
    url: Option<String>,

    /// Personal access token
    #[arg(long, global = true, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Group id or full path; members of this group are listed
    #[arg(long, global = true, env = "GITLAB_GROUP_ID")]
    group_id: Option<String>,

    /// Which listing to cache: auto, group or users
    #[arg(long, global = true, env = "GITLAB_SCOPE", value_parser = parse_scope)]
    scope: Option<ListingScope>,

    /// Cache time-to-live in seconds
    #[arg(long, global = true, env = "GITLAB_CACHE_TTL")]
    ttl: Option<u64>,

    /// Maximum users returned per query
    #[arg(long, global = true, env = "GITLAB_MAX_USERS_PER_QUERY")]
    max_results: Option<usize>,

    /// Matching discipline: prefix (username) or substring (username or name)
    #[arg(long, global = true, env = "GITLAB_MATCH_MODE", value_parser = parse_match_mode)]
    match_mode: Option<MatchMode>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reload the member listing, ignoring the cache TTL
    Fetch,

    /// Show the cached members
    Show {
        /// Number of members to preview
        #[arg(long, default_value = "15")]
        preview: usize,
    },

    /// Completion proposals for the mention at the end of TEXT
    Complete {
        /// Text being typed, e.g. "thanks @ali"
        text: String,

        /// Caret position (chars); defaults to the end of TEXT
        #[arg(long)]
        caret: Option<usize>,

        /// Name of the document being edited; only Markdown and CODEOWNERS take mentions
        #[arg(long)]
        file: Option<String>,
    },

    /// Search users on the server, bypassing the cache
    Search {
        /// Search term (username, name or email)
        query: String,
    },

    /// Interactive completion prompt
    Shell,
}

/// Resolve settings: defaults, then the properties file, then flags/env.
fn load_settings(args: &SettingsArgs) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load_file(path).map_err(|e| miette::miette!("{}", e))?,
        None => match dirs::config_dir().map(|dir| dir.join(DEFAULT_CONFIG_FILE)) {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading default settings file");
                Settings::load_file(&path).map_err(|e| miette::miette!("{}", e))?
            }
            _ => Settings::default(),
        },
    };

    if let Some(url) = &args.url {
        settings.host_url = url.clone();
    }
    if let Some(token) = &args.token {
        settings.private_token = token.clone();
    }
    if let Some(group_id) = &args.group_id {
        settings.group_id = group_id.clone();
    }
    if let Some(scope) = args.scope {
        settings.scope = scope;
    }
    if let Some(ttl) = args.ttl {
        settings.cache_ttl_secs = ttl;
    }
    if let Some(max) = args.max_results {
        settings.max_users_per_query = max.max(1);
    }
    if let Some(mode) = args.match_mode {
        settings.match_mode = mode;
    }

    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays clean.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "mentions=info,mentions_directory=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli.settings)?;
    let directory = commands::Directory::new(settings)?;

    match cli.command {
        Commands::Fetch => commands::fetch(&directory).await,
        Commands::Show { preview } => commands::show(&directory, preview).await,
        Commands::Complete { text, caret, file } => {
            commands::complete(&directory, &text, caret, file.as_deref()).await
        }
        Commands::Search { query } => commands::search(&directory, &query).await,
        Commands::Shell => shell::run(&directory).await,
    }
}
