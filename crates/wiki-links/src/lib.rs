//! Locate and parse Obsidian-style wiki links in note markdown
//!
//! Supports:
//! - Basic links: `[[Note]]`
//! - Aliases: `[[Note|Display Text]]`
//! - Headers: `[[Note#Header]]`
//! - Block references: `[[Note#^block-id]]`
//! - Embeds: `![[Note]]`, `![[diagram.png]]`
//! - Paths: `[[folder/Note]]`
//!
//! Links are returned with the byte range they occupy in the source so callers
//! can splice replacements into the surrounding text.

use std::ops::Range;

/// A wiki link found in markdown content.
#[derive(Debug, Clone, PartialEq)]
pub struct WikiLink {
    /// Everything before the `|`: "folder/Note#Header"
    pub target: String,
    /// Header reference if present: "Header Section"
    pub header: Option<String>,
    /// Block ID if present: "block-123"
    pub block_id: Option<String>,
    /// Display alias if present: "my custom text"
    pub alias: Option<String>,
    /// Whether this is an embed (`![[...]]`)
    pub is_embed: bool,
    /// Byte range of the whole link in the source, including `!` for embeds
    pub span: Range<usize>,
}

impl WikiLink {
    /// Returns alias if present, otherwise the target as written
    pub fn display_text(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.target)
    }
}

/// Strip the fragment from a link target: `"Note#Header"` → `"Note"`.
///
/// Mirrors Obsidian's `getLinkpath`, so it also accepts the `data-href`
/// attribute values the renderer writes on internal links.
pub fn link_path(target: &str) -> &str {
    match target.find('#') {
        Some(pos) => target[..pos].trim(),
        None => target.trim(),
    }
}

/// Find every wiki link in `content`, in source order.
///
/// Links never span lines and an unterminated `[[` is ignored.
pub fn find_wiki_links(content: &str) -> Vec<WikiLink> {
    let bytes = content.as_bytes();
    let mut links = Vec::new();
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'[' && bytes[i + 1] == b'[' {
            let is_embed = i > 0 && bytes[i - 1] == b'!';
            let start = if is_embed { i - 1 } else { i };
            if let Some(close) = find_close(bytes, i + 2) {
                let inner = &content[i + 2..close];
                if !inner.trim().is_empty() {
                    links.push(parse_link_content(inner, is_embed, start..close + 2));
                }
                i = close + 2;
                continue;
            }
        }
        i += 1;
    }

    links
}

/// Position of the `]]` closing a link whose content starts at `from`.
fn find_close(bytes: &[u8], from: usize) -> Option<usize> {
    let mut j = from;
    while j + 1 < bytes.len() {
        match bytes[j] {
            b'\n' => return None,
            b'[' if bytes[j + 1] == b'[' => return None,
            b']' if bytes[j + 1] == b']' => return Some(j),
            _ => j += 1,
        }
    }
    None
}

fn parse_link_content(content: &str, is_embed: bool, span: Range<usize>) -> WikiLink {
    let (target, alias) = match content.split_once('|') {
        Some((target, alias)) => (target.trim(), Some(alias.trim().to_string())),
        None => (content.trim(), None),
    };

    let (header, block_id) = match target.split_once('#') {
        Some((_, fragment)) => match fragment.strip_prefix('^') {
            Some(block) => (None, Some(block.to_string())),
            None => (Some(fragment.to_string()), None),
        },
        None => (None, None),
    };

    WikiLink {
        target: target.to_string(),
        header,
        block_id,
        alias,
        is_embed,
        span,
    }
}
