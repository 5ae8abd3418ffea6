use quip_sync::{Settings, SettingsError};
use std::path::{Path, PathBuf};

/// Plugin data file, relative to the vault root.
pub const SETTINGS_FILE: &str = ".obsidian/plugins/obsidian-quip/data.json";

/// Where the vault and its Quip settings live.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Obsidian vault root directory
    pub vault_path: PathBuf,
    pub settings_path: PathBuf,
}

impl Config {
    /// Resolve from command-line values, falling back to `OBSIDIAN_VAULT_PATH`.
    pub fn resolve(vault: Option<&str>, settings: Option<&str>) -> Result<Self, ConfigError> {
        let env_vault = std::env::var("OBSIDIAN_VAULT_PATH").ok();
        Self::from_sources(vault, env_vault.as_deref(), settings)
    }

    fn from_sources(
        vault_arg: Option<&str>,
        vault_env: Option<&str>,
        settings: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let vault = vault_arg
            .or(vault_env)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::MissingVaultPath)?;
        let vault_path = expand_tilde(vault.trim());
        if !vault_path.is_dir() {
            return Err(ConfigError::VaultNotFound(vault_path));
        }

        let settings_path = match settings {
            Some(path) => expand_tilde(path),
            None => vault_path.join(SETTINGS_FILE),
        };

        Ok(Self {
            vault_path,
            settings_path,
        })
    }

    /// Saved settings with `QUIP_HOSTNAME` / `QUIP_TOKEN` applied on top.
    pub async fn load_settings(&self) -> Result<Settings, SettingsError> {
        Ok(Settings::load(&self.settings_path).await?.apply_env())
    }

    /// Saved settings only, for editing.
    pub async fn load_saved_settings(&self) -> Result<Settings, SettingsError> {
        Settings::load(&self.settings_path).await
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No vault given: pass --vault or set OBSIDIAN_VAULT_PATH")]
    MissingVaultPath,

    #[error("Vault folder {} does not exist", .0.display())]
    VaultNotFound(PathBuf),
}
