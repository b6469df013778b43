//! Interactive completion prompt.
//!
//! Every line is treated as text typed into a mention-aware document with
//! the caret at the end. Lines starting with `:` are commands.

use miette::{IntoDiagnostic, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use mentions_directory::{DirectoryEvent, MemberDirectory, mention};

use crate::commands::{self, Directory};

const HELP: &str = "\
Type text containing @fragment to get completions.
  :fetch          reload the member listing
  :show [n]       show cached members (preview n, default 15)
  :clear          drop the cached listing
  :search <q>     server-side user search
  :set [key val]  show settings, or change one (url/token/group/scope/ttl/max/match)
  :file [name]    document being edited; completion only in .md/.mdx/CODEOWNERS
  :help           this text
  :quit           exit";

/// Parsed prompt line.
#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    Empty,
    Fetch,
    Show(usize),
    Clear,
    Search(&'a str),
    Settings,
    Set(&'a str, &'a str),
    File(Option<&'a str>),
    Help,
    Quit,
    Unknown(&'a str),
    Text(&'a str),
}

fn parse_line(line: &str) -> Line<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Line::Empty;
    }
    let Some(command) = trimmed.strip_prefix(':') else {
        return Line::Text(line.trim_end_matches(['\r', '\n']));
    };

    let (name, rest) = command
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((command, ""));

    match name {
        "fetch" | "reload" => Line::Fetch,
        "show" => Line::Show(rest.parse().unwrap_or(15)),
        "clear" => Line::Clear,
        "search" if !rest.is_empty() => Line::Search(rest),
        "set" if rest.is_empty() => Line::Settings,
        "set" => match rest.split_once(char::is_whitespace) {
            Some((key, value)) => Line::Set(key, value.trim()),
            None => Line::Unknown(trimmed),
        },
        "file" => Line::File((!rest.is_empty()).then_some(rest)),
        "help" | "h" | "?" => Line::Help,
        "quit" | "q" | "exit" => Line::Quit,
        _ => Line::Unknown(trimmed),
    }
}

/// Print directory events as they happen.
async fn report_events(mut rx: broadcast::Receiver<DirectoryEvent>) {
    loop {
        match rx.recv().await {
            Ok(DirectoryEvent::InvalidCredentials) => {
                eprintln!("GitLab token is not valid. Check GITLAB_TOKEN.");
            }
            Ok(DirectoryEvent::Cleared) => eprintln!("GitLab Mentions caches cleared."),
            Ok(DirectoryEvent::RefreshFailed { resource }) => match resource {
                Some(resource) => warn!(%resource, "refresh returned no members"),
                None => warn!("refresh skipped: directory not configured"),
            },
            Ok(DirectoryEvent::Refreshed { count, resource }) => {
                debug!(count, %resource, "listing refreshed");
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "event reporter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

pub async fn run(directory: &Directory) -> Result<()> {
    let reporter = tokio::spawn(report_events(directory.coordinator.subscribe()));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut document: Option<String> = None;

    println!("{}", HELP);
    loop {
        stdout.write_all(b"> ").await.into_diagnostic()?;
        stdout.flush().await.into_diagnostic()?;

        let Some(line) = lines.next_line().await.into_diagnostic()? else {
            break;
        };

        // Command failures are reported and the prompt carries on.
        let result = match parse_line(&line) {
            Line::Empty => Ok(()),
            Line::Fetch => commands::fetch(directory).await,
            Line::Show(preview) => {
                commands::print_cached(directory, preview);
                Ok(())
            }
            Line::Clear => {
                directory.coordinator.clear_cache();
                Ok(())
            }
            Line::Search(query) => commands::search(directory, query).await,
            Line::Settings => {
                println!("{}", commands::settings_summary(&directory.settings));
                Ok(())
            }
            Line::Set(key, value) => commands::apply_setting(&directory.settings, key, value)
                .map(|()| println!("{}", commands::settings_summary(&directory.settings))),
            Line::File(name) => {
                document = name.map(str::to_string);
                match &document {
                    Some(name) if !mention::is_mention_document(name) => {
                        println!("{}: completion disabled for this document", name)
                    }
                    Some(name) => println!("{}: completion enabled", name),
                    None => println!("no document set: completion enabled"),
                }
                Ok(())
            }
            Line::Help => {
                println!("{}", HELP);
                Ok(())
            }
            Line::Quit => break,
            Line::Unknown(command) => {
                println!("unknown command '{}', try :help", command);
                Ok(())
            }
            Line::Text(text) => {
                let caret = text.chars().count();
                let proposals =
                    commands::proposals(directory, text, caret, document.as_deref()).await;
                if proposals.is_empty() && mention::mention_fragment(text, caret).is_some() {
                    println!("(no matches)");
                }
                for proposal in proposals {
                    println!("  {:<24} {}", proposal.label, proposal.insert);
                }
                Ok(())
            }
        };
        if let Err(e) = result {
            eprintln!("{:?}", e);
        }
    }

    reporter.abort();
    debug!(cached = directory.coordinator.snapshot().len(), "shell exiting");
    Ok(())
}
