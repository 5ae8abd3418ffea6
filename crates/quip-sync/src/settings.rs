//! Persisted plugin settings.
//!
//! Stored as JSON in the plugin's `data.json`, using the plugin's camelCase
//! keys. Missing keys take their defaults.

use crate::outbound::OutboundOptions;
use quip_api::{QuipClient, DEFAULT_HOSTNAME};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hostname: String,
    pub token: String,
    /// Drop the rendered front matter before sending HTML
    #[serde(rename = "removeYAML")]
    pub remove_yaml: bool,
    /// Write the new document URL into the note's front matter on publish
    #[serde(rename = "addLink")]
    pub add_link: bool,
    #[serde(rename = "inlineEmbeds")]
    pub inline_embeds: bool,
    /// Put the note title as an `<h1>` at the top of the document
    #[serde(rename = "prependTitle")]
    pub prepend_title: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            token: String::new(),
            remove_yaml: true,
            add_link: true,
            inline_embeds: true,
            prepend_title: false,
        }
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("hostname", &self.hostname)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("remove_yaml", &self.remove_yaml)
            .field("add_link", &self.add_link)
            .field("inline_embeds", &self.inline_embeds)
            .field("prepend_title", &self.prepend_title)
            .finish()
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let settings = Self::from_json(&json)?;
                tracing::debug!(path = %path.display(), "Loaded settings");
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Write settings as pretty JSON, creating parent folders.
    pub async fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let io_error = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await.map_err(io_error)?;
        Ok(())
    }

    /// Override hostname and token from `QUIP_HOSTNAME` / `QUIP_TOKEN`.
    pub fn apply_env(self) -> Self {
        self.with_overrides(
            std::env::var("QUIP_HOSTNAME").ok(),
            std::env::var("QUIP_TOKEN").ok(),
        )
    }

    /// Replace hostname and token with any non-empty override.
    pub fn with_overrides(mut self, hostname: Option<String>, token: Option<String>) -> Self {
        if let Some(hostname) = hostname.filter(|h| !h.trim().is_empty()) {
            self.hostname = hostname.trim().to_string();
        }
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.token = token.trim().to_string();
        }
        self
    }

    pub fn outbound_options(&self) -> OutboundOptions {
        OutboundOptions {
            inline_embeds: self.inline_embeds,
            remove_yaml: self.remove_yaml,
        }
    }

    /// Build a client for the configured host.
    ///
    /// Fails without touching the network when the token or hostname is unset.
    pub fn client(&self) -> quip_api::Result<QuipClient> {
        QuipClient::new(&self.hostname, &self.token)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Could not access settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings are not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
