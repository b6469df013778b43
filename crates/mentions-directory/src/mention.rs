//! `@handle` detection and completion entries for editor hosts.
//!
//! Positions are char indices into the document text, not byte offsets.

use crate::UserRecord;
use crate::coordinator::MemberDirectory;

/// The `@fragment` immediately before a caret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionFragment {
    /// Index of the `@`.
    pub at: usize,
    /// Text between the `@` and the caret.
    pub fragment: String,
}

/// A completion proposal for one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub username: String,
    /// Display name, or the username when there is none.
    pub label: String,
    /// Secondary text, e.g. `@alice • GitLab`.
    pub type_text: String,
    /// Text that replaces `replace_start..replace_end`.
    pub insert: String,
    pub replace_start: usize,
    pub replace_end: usize,
}

fn is_handle_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-' | '/')
}

/// Find the mention being typed at `caret`.
///
/// Walks back over handle characters to an `@`. Returns `None` when a
/// non-handle character comes first, when the caret is out of range, or
/// when nothing has been typed after the `@` yet.
pub fn mention_fragment(text: &str, caret: usize) -> Option<MentionFragment> {
    let chars: Vec<char> = text.chars().collect();
    if caret == 0 || caret > chars.len() {
        return None;
    }

    let mut i = caret;
    while i > 0 {
        i -= 1;
        match chars[i] {
            '@' => {
                let fragment: String = chars[i + 1..caret].iter().collect();
                return (!fragment.is_empty()).then_some(MentionFragment { at: i, fragment });
            }
            ch if is_handle_char(ch) => continue,
            _ => return None,
        }
    }
    None
}

/// Text to insert for `username`: the bare handle when an `@` already
/// precedes the replaced range, otherwise `@handle`.
pub fn insertion_text(username: &str, has_at_before: bool) -> String {
    if has_at_before {
        username.to_string()
    } else {
        format!("@{}", username)
    }
}

/// Documents where mention completion applies: Markdown and CODEOWNERS.
pub fn is_mention_document(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    lower.ends_with(".md") || lower.ends_with(".mdx") || lower == "codeowners"
}

impl Completion {
    /// Proposal replacing the fragment of `mention` (the `@` stays).
    pub fn for_user(user: &UserRecord, mention: &MentionFragment) -> Self {
        let replace_start = mention.at + 1;
        Self {
            username: user.username.clone(),
            label: user.label().to_string(),
            type_text: format!("@{} • GitLab", user.username),
            insert: insertion_text(&user.username, true),
            replace_start,
            replace_end: replace_start + mention.fragment.chars().count(),
        }
    }
}

/// Completion proposals for the caret position.
///
/// Brings the directory up to date first (a no-op while the cache is
/// fresh, otherwise a full fetch), then filters the cached members.
pub async fn complete<D>(directory: &D, text: &str, caret: usize) -> Vec<Completion>
where
    D: MemberDirectory + ?Sized,
{
    let Some(mention) = mention_fragment(text, caret) else {
        return Vec::new();
    };

    directory.ensure_loaded().await;

    directory
        .filter_members(&mention.fragment)
        .iter()
        .filter(|user| !user.username.trim().is_empty())
        .map(|user| Completion::for_user(user, &mention))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::cache::CacheSnapshot;
    use crate::query;

    struct FixedDirectory {
        snapshot: Arc<CacheSnapshot>,
        ensure_calls: AtomicUsize,
    }

    impl FixedDirectory {
        fn new(users: Vec<UserRecord>) -> Self {
            Self {
                snapshot: Arc::new(CacheSnapshot::new(users, 1)),
                ensure_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl MemberDirectory for FixedDirectory {
        async fn ensure_loaded(&self) {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        }

        async fn force_reload(&self) -> usize {
            self.snapshot.len()
        }

        fn snapshot(&self) -> Arc<CacheSnapshot> {
            Arc::clone(&self.snapshot)
        }

        fn filter_members(&self, fragment: &str) -> Vec<UserRecord> {
            query::filter_prefix(fragment, &self.snapshot, 10)
        }
    }

    #[test]
    fn test_fragment_at_end_of_text() {
        let text = "Thanks @ali";
        assert_eq!(
            mention_fragment(text, text.chars().count()),
            Some(MentionFragment {
                at: 7,
                fragment: "ali".into()
            })
        );
    }

    #[test]
    fn test_fragment_allows_handle_punctuation() {
        let text = "* @org/team.lead-x_y";
        let found = mention_fragment(text, text.chars().count()).unwrap();
        assert_eq!(found.fragment, "org/team.lead-x_y");
        assert_eq!(found.at, 2);
    }

    #[test]
    fn test_fragment_mid_text() {
        let text = "cc @bob and more";
        assert_eq!(mention_fragment(text, 6).unwrap().fragment, "bo");
    }

    #[test]
    fn test_no_fragment() {
        assert_eq!(mention_fragment("hello world", 11), None);
        assert_eq!(mention_fragment("email a@b c", 11), None);
        assert_eq!(mention_fragment("just @", 6), None);
        assert_eq!(mention_fragment("@alice", 0), None);
        assert_eq!(mention_fragment("@alice", 99), None);
    }

    #[test]
    fn test_fragment_uses_char_positions() {
        let text = "héllo @zoë";
        assert_eq!(mention_fragment(text, text.chars().count()).unwrap().fragment, "zoë");
    }

    #[test]
    fn test_insertion_text() {
        assert_eq!(insertion_text("alice", true), "alice");
        assert_eq!(insertion_text("alice", false), "@alice");
    }

    #[test]
    fn test_mention_documents() {
        assert!(is_mention_document("README.md"));
        assert!(is_mention_document("docs/guide.MDX"));
        assert!(is_mention_document("CODEOWNERS"));
        assert!(is_mention_document("codeowners"));
        assert!(!is_mention_document("main.rs"));
    }

    #[tokio::test]
    async fn test_complete_loads_then_filters() {
        let directory = FixedDirectory::new(vec![
            UserRecord::new(1, "alice").with_name("Alice Liddell"),
            UserRecord::new(2, "alibaba"),
            UserRecord::new(3, "bob"),
        ]);

        let text = "ping @Ali";
        let proposals = complete(&directory, text, text.chars().count()).await;

        assert_eq!(directory.ensure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            proposals,
            vec![
                Completion {
                    username: "alice".into(),
                    label: "Alice Liddell".into(),
                    type_text: "@alice • GitLab".into(),
                    insert: "alice".into(),
                    replace_start: 6,
                    replace_end: 9,
                },
                Completion {
                    username: "alibaba".into(),
                    label: "alibaba".into(),
                    type_text: "@alibaba • GitLab".into(),
                    insert: "alibaba".into(),
                    replace_start: 6,
                    replace_end: 9,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_complete_outside_mention_does_not_load() {
        let directory = FixedDirectory::new(vec![UserRecord::new(1, "alice")]);
        assert!(complete(&directory, "plain text", 10).await.is_empty());
        assert_eq!(directory.ensure_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_complete_through_trait_object() {
        let directory: Arc<dyn MemberDirectory> =
            Arc::new(FixedDirectory::new(vec![UserRecord::new(1, "carol")]));
        let proposals = complete(directory.as_ref(), "@ca", 3).await;
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].username, "carol");
    }
}
