//! Host collaborators: markdown rendering, link resolution, notifications.
//!
//! The note-taking host owns these; the sync pipeline only calls into them.

use crate::vault::Vault;
use async_trait::async_trait;
use obsidian_fs::{file_stem, normalize_path, parent_folder};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Failed to render {path}: {reason}")]
pub struct RenderError {
    pub path: String,
    pub reason: String,
}

/// Markdown to HTML in the host's dialect.
///
/// Embeds are expected as elements with class `internal-embed` and a `src`
/// attribute holding the link text; internal links as
/// `a.internal-link[data-href]`; YAML front matter as an element with class
/// `frontmatter`.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, markdown: &str, source_path: &str) -> Result<String, RenderError>;
}

/// Resolve link text to a vault file path.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    /// `link` is a link path (no `#heading` suffix); `source_path` is the note
    /// containing the link, or "" when there is none.
    async fn resolve_link(&self, link: &str, source_path: &str) -> Option<String>;
}

/// Transient user notifications.
pub trait Notifier: Send + Sync {
    fn notice(&self, message: &str);

    /// Confirmation surface shown after a successful publish or update.
    fn success(&self, message: &str, link: &str);
}

/// Link resolution over the vault's file listing.
///
/// Matches Obsidian's "shortest path when possible" behaviour: an exact
/// vault path wins, then a file in the source note's folder, then the
/// shortest path whose tail matches the link.
pub struct VaultIndex {
    vault: Arc<dyn Vault>,
}

impl VaultIndex {
    pub fn new(vault: Arc<dyn Vault>) -> Self {
        Self { vault }
    }
}

#[async_trait]
impl LinkResolver for VaultIndex {
    async fn resolve_link(&self, link: &str, source_path: &str) -> Option<String> {
        let link = normalize_path(wiki_links::link_path(link));
        if link.is_empty() {
            return None;
        }

        let files = match self.vault.list().await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Failed to list vault for link resolution: {}", e);
                return None;
            }
        };
        resolve_in(&files, &link, source_path)
    }
}

fn resolve_in(files: &[String], link: &str, source_path: &str) -> Option<String> {
    let has_extension = obsidian_fs::extension(link).is_some();
    let with_md = format!("{}.md", link);
    let matches_path = |candidate: &str, path: &str| {
        path.eq_ignore_ascii_case(candidate)
            || path
                .len()
                .checked_sub(candidate.len() + 1)
                .is_some_and(|split| {
                    path.as_bytes()[split] == b'/' && path[split + 1..].eq_ignore_ascii_case(candidate)
                })
    };

    let candidates: Vec<&String> = files
        .iter()
        .filter(|path| {
            matches_path(&with_md, path) || (has_extension && matches_path(link, path))
        })
        .collect();

    // Exact vault path
    if let Some(exact) = candidates
        .iter()
        .find(|p| p.eq_ignore_ascii_case(&with_md) || p.eq_ignore_ascii_case(link))
    {
        return Some((*exact).clone());
    }

    // Same folder as the linking note
    let source_folder = parent_folder(source_path);
    if let Some(sibling) = candidates
        .iter()
        .find(|p| parent_folder(p).eq_ignore_ascii_case(source_folder))
    {
        return Some((*sibling).clone());
    }

    candidates
        .into_iter()
        .min_by_key(|p| (p.matches('/').count(), p.len()))
        .cloned()
}

/// Title used for a note: its `title` front matter entry or its base name.
pub fn note_title(frontmatter: &obsidian_fs::Frontmatter, path: &str) -> String {
    frontmatter
        .get("title")
        .and_then(|v| v.as_str())
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| file_stem(path).to_string())
}
