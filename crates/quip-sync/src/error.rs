use crate::host::RenderError;
use crate::settings::SettingsError;
use crate::vault::VaultError;
use obsidian_fs::FrontmatterError;
use quip_api::{ApiError, ErrorKind};
use thiserror::Error;

/// One planned deletion that did not go through.
#[derive(Debug)]
pub struct DeletionFailure {
    /// Section id or heading text that was targeted
    pub target: String,
    pub error: ApiError,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Frontmatter(#[from] FrontmatterError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("{path} is not linked to a Quip document")]
    MissingLink { path: String },

    #[error("Marker {marker} did not appear in {link}")]
    MarkerNotFound { link: String, marker: String },

    /// Old sections that can only be targeted by a heading the new content
    /// also starts a section with. Nothing was deleted.
    #[error("Old sections of {link} share headings with the new content: {}", .headings.join(", "))]
    AmbiguousSection { link: String, headings: Vec<String> },

    #[error("{} of {attempted} section deletions failed on {link}", .failures.len())]
    PartialFailure {
        link: String,
        failures: Vec<DeletionFailure>,
        attempted: usize,
    },
}

impl SyncError {
    /// Kind of the underlying API error, if this came from the API.
    pub fn api_kind(&self) -> Option<ErrorKind> {
        match self {
            SyncError::Api(e) => Some(e.kind()),
            _ => None,
        }
    }

    /// The single line shown to the user when a command fails.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Api(ApiError::Authentication { .. }) => {
                "Quip authorization failed. Check the API token in settings.".to_string()
            }
            SyncError::Api(ApiError::NotFound { .. }) => {
                "Document not found in Quip. The link in this note may be stale.".to_string()
            }
            SyncError::Api(e @ ApiError::Configuration(_)) => {
                format!("{}. Set it in the plugin settings.", e)
            }
            SyncError::Api(e) => match e.diagnostic() {
                Some(detail) => format!("Quip error: {}", detail),
                None => e.to_string(),
            },
            SyncError::MarkerNotFound { link, .. } => format!(
                "Quip did not return the updated document for {}. It may now contain both old and new content; run update again to clean up.",
                link
            ),
            SyncError::AmbiguousSection { link, headings } => format!(
                "Updated {} but the old sections {} could not be removed safely because the new content has the same headings. Remove them manually.",
                link,
                headings.join(", ")
            ),
            SyncError::PartialFailure {
                link,
                failures,
                attempted,
            } => format!(
                "Updated {} but {} of {} old sections could not be removed. The document may contain duplicated content; clean it up manually or run update again.",
                link,
                failures.len(),
                attempted
            ),
            other => other.to_string(),
        }
    }
}

/// Failure confined to one element of a rendered note. Logged and skipped.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Could not resolve embed or link {0}")]
    Unresolved(String),

    #[error("Could not read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("Could not download image {src}: {reason}")]
    Download { src: String, reason: String },
}
