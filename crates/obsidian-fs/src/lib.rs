//! Path and frontmatter utilities for Obsidian notes
//!
//! Handles vault path validation and normalization, note file naming, and
//! YAML frontmatter parsing. These are pure functions with no I/O - reading
//! and writing files is the vault implementation's job.

mod frontmatter;

pub use frontmatter::{
    build_note_with_frontmatter, parse_frontmatter, serialize_frontmatter, split_frontmatter,
    try_parse_frontmatter, update_frontmatter, Frontmatter, FrontmatterError, ParsedNote,
};

/// Normalize a vault-relative path the way Obsidian's `normalizePath` does:
/// backslashes become slashes, repeated slashes collapse, leading and
/// trailing slashes are dropped, and non-breaking spaces become spaces.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/").replace('\u{a0}', " ");
    unified
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a folder and a file name into a normalized vault path.
pub fn join_path(folder: &str, name: &str) -> String {
    normalize_path(&format!("{}/{}", folder, name))
}

/// Folder containing `path` ("" for the vault root).
pub fn parent_folder(path: &str) -> &str {
    match path.rfind('/') {
        Some(pos) => &path[..pos],
        None => "",
    }
}

/// File name without folder or extension: "folder/My Note.md" → "My Note"
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// Lowercased extension without the dot: "image.PNG" → Some("png")
pub fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.rfind('.')
        .filter(|&pos| pos > 0 && pos + 1 < name.len())
        .map(|pos| name[pos + 1..].to_ascii_lowercase())
}

/// Replace characters Obsidian refuses in note names with spaces-safe
/// substitutes so a remote title can be used as a file name.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '-',
            '*' | '?' | '"' | '<' | '>' | '|' | '#' | '^' | '[' | ']' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Validate that a relative path is safe (no directory traversal)
pub fn validate_relative_path(path: &str) -> Result<String, PathValidationError> {
    let clean_path = path.strip_prefix('/').unwrap_or(path);

    if clean_path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(PathValidationError::DirectoryTraversal);
    }

    if clean_path.starts_with('/') || clean_path.starts_with('\\') {
        return Err(PathValidationError::AbsolutePath);
    }

    Ok(clean_path.to_string())
}

/// Ensure .md extension on note paths
pub fn ensure_markdown_extension(note_path: &str) -> String {
    if note_path.ends_with(".md") {
        note_path.to_string()
    } else {
        format!("{}.md", note_path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathValidationError {
    DirectoryTraversal,
    AbsolutePath,
}

impl std::fmt::Display for PathValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathValidationError::DirectoryTraversal => {
                write!(f, "Path contains directory traversal")
            }
            PathValidationError::AbsolutePath => write!(f, "Path is absolute"),
        }
    }
}

impl std::error::Error for PathValidationError {}
