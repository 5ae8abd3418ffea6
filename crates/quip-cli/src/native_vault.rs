//! Vault backed by a directory on disk, using tokio::fs.

use async_trait::async_trait;
use obsidian_fs::{normalize_path, validate_relative_path};
use quip_sync::vault::{Result, Vault, VaultError};
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::fs;

pub struct NativeVault {
    root: PathBuf,
}

impl NativeVault {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let normalized = normalize_path(path);
        if normalized.is_empty() {
            return Err(VaultError::InvalidPath {
                path: path.to_string(),
                reason: "empty path".to_string(),
            });
        }
        let relative = validate_relative_path(&normalized).map_err(|e| VaultError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.root.join(relative))
    }

    /// Generate a random hex string for temp file names.
    fn random_hex() -> String {
        let bytes: [u8; 16] = rand::rng().random();
        hex::encode(bytes)
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
        let temp_path = path.with_extension(format!("{}.tmp", Self::random_hex()));

        if let Err(e) = fs::write(&temp_path, content).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        Ok(())
    }
}

fn io_error(path: &str, e: std::io::Error) -> VaultError {
    if e.kind() == std::io::ErrorKind::NotFound {
        VaultError::NotFound(path.to_string())
    } else {
        VaultError::Io(format!("{}: {}", path, e))
    }
}

#[async_trait]
impl Vault for NativeVault {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        fs::read(&full_path).await.map_err(|e| io_error(path, e))
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.full_path(path)?;
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(path, e))?;
        }
        Self::atomic_write(&full_path, content)
            .await
            .map_err(|e| io_error(path, e))?;
        tracing::debug!(path, bytes = content.len(), "Wrote vault file");
        Ok(())
    }

    /// Every file under the root, skipping dot-folders such as `.obsidian`.
    async fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = fs::read_dir(&dir)
                .await
                .map_err(|e| VaultError::Io(format!("{}: {}", dir.display(), e)))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| VaultError::Io(format!("{}: {}", dir.display(), e)))?
            {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.starts_with('.') {
                    continue;
                }
                let relative = if prefix.is_empty() {
                    name
                } else {
                    format!("{}/{}", prefix, name)
                };
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| VaultError::Io(format!("{}: {}", relative, e)))?;
                if file_type.is_dir() {
                    pending.push((entry.path(), relative));
                } else if file_type.is_file() {
                    files.push(relative);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        fs::try_exists(&full_path)
            .await
            .map_err(|e| io_error(path, e))
    }
}
