//! Vault abstraction for note and attachment storage.
//!
//! Implementations:
//! - `MemoryVault` - For testing
//! - `NativeVault` (in quip-cli) - Uses tokio::fs under a vault root
//!
//! Paths are vault-relative and slash-separated.

use async_trait::async_trait;
use obsidian_fs::{normalize_path, parse_frontmatter, update_frontmatter, Frontmatter};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid vault path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("File is not valid UTF-8: {0}")]
    InvalidUtf8(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;

/// Storage for the notes and attachments of one vault.
#[async_trait]
pub trait Vault: Send + Sync {
    /// Read file contents
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Create or overwrite a file (creates parent folders if needed)
    async fn write(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Every file path in the vault, sorted
    async fn list(&self) -> Result<Vec<String>>;

    /// Check if path exists
    async fn exists(&self, path: &str) -> Result<bool>;

    async fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path).await?;
        String::from_utf8(bytes).map_err(|_| VaultError::InvalidUtf8(path.to_string()))
    }

    /// Markdown notes only
    async fn markdown_files(&self) -> Result<Vec<String>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|p| p.ends_with(".md"))
            .collect())
    }
}

/// Front matter of a note, empty when it has none or the YAML does not parse.
pub async fn read_frontmatter(vault: &dyn Vault, path: &str) -> Result<Frontmatter> {
    let raw = vault.read_to_string(path).await?;
    Ok(parse_frontmatter(&raw).frontmatter.unwrap_or_default())
}

/// Single string entry of a note's front matter.
pub async fn frontmatter_string(vault: &dyn Vault, path: &str, key: &str) -> Result<Option<String>> {
    let frontmatter = read_frontmatter(vault, path).await?;
    Ok(frontmatter
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string))
}

/// Read-modify-write a note's front matter.
///
/// The body is left as-is. A front matter block that does not parse is an
/// error rather than being replaced.
pub async fn mutate_frontmatter<F>(
    vault: &dyn Vault,
    path: &str,
    transform: F,
) -> std::result::Result<(), crate::SyncError>
where
    F: FnOnce(Frontmatter) -> Frontmatter + Send,
{
    let raw = vault.read_to_string(path).await?;
    let updated = update_frontmatter(&raw, transform)?;
    vault.write(path, updated.as_bytes()).await?;
    Ok(())
}

/// In-memory vault for testing
#[derive(Default)]
pub struct MemoryVault {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
    /// Every write in order, for asserting on side effects
    writes: RwLock<Vec<String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a vault pre-populated with text files.
    pub fn with_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: AsRef<[u8]>,
    {
        let files = files
            .into_iter()
            .map(|(p, c)| (normalize_path(p.as_ref()), c.as_ref().to_vec()))
            .collect();
        Self {
            files: RwLock::new(files),
            writes: RwLock::new(Vec::new()),
        }
    }

    /// Paths written since construction, in order
    pub async fn written_paths(&self) -> Vec<String> {
        self.writes.read().await.clone()
    }
}

#[async_trait]
impl Vault for MemoryVault {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let path = normalize_path(path);
        let files = self.files.read().await;
        files
            .get(&path)
            .cloned()
            .ok_or(VaultError::NotFound(path))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let path = normalize_path(path);
        if path.is_empty() {
            return Err(VaultError::InvalidPath {
                path,
                reason: "empty path".to_string(),
            });
        }
        self.files.write().await.insert(path.clone(), content.to_vec());
        self.writes.write().await.push(path);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.files.read().await.keys().cloned().collect())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.files.read().await.contains_key(&normalize_path(path)))
    }
}
