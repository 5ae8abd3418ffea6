//! Error classification for Quip API calls.
//!
//! Callers branch on [`ErrorKind`], never on raw status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Token or hostname left at its placeholder value. Raised before any request.
    #[error("Quip API {0} has not been set")]
    Configuration(&'static str),

    #[error("Quip authorization failed")]
    Authentication { body: String },

    #[error("Document not found in Quip: {resource}")]
    NotFound { resource: String },

    #[error("Quip rejected the request ({status}): {body}")]
    Validation { status: u16, body: String },

    #[error("Quip server error: {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Quip returned a repeated pagination cursor: {0}")]
    CursorLoop(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response from Quip: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not a Quip document link: {0}")]
    InvalidLink(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Coarse category of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Authentication,
    NotFound,
    Validation,
    Server,
    Transport,
    Decode,
    InvalidLink,
}

impl ApiError {
    /// Map a non-success HTTP status to its error.
    ///
    /// 401 → authentication, 404 → not found, other 4xx → validation,
    /// everything else ≥ 400 → server.
    pub fn from_status(status: u16, resource: &str, body: String) -> Self {
        match status {
            401 => ApiError::Authentication { body },
            404 => ApiError::NotFound {
                resource: resource.to_string(),
            },
            400..=499 => ApiError::Validation { status, body },
            _ => ApiError::Server { status, body },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Configuration(_) => ErrorKind::Configuration,
            ApiError::Authentication { .. } => ErrorKind::Authentication,
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::Validation { .. } => ErrorKind::Validation,
            ApiError::Server { .. } | ApiError::CursorLoop(_) => ErrorKind::Server,
            ApiError::Http(_) => ErrorKind::Transport,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::InvalidLink(_) => ErrorKind::InvalidLink,
        }
    }

    /// HTTP status behind this error, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Authentication { .. } => Some(401),
            ApiError::NotFound { .. } => Some(404),
            ApiError::Validation { status, .. } | ApiError::Server { status, .. } => Some(*status),
            ApiError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Human-readable detail from Quip's JSON error payload, if the body has one.
    ///
    /// Quip answers failures with `{"error": ..., "error_code": ..., "error_description": ...}`.
    pub fn diagnostic(&self) -> Option<String> {
        let body = match self {
            ApiError::Authentication { body }
            | ApiError::Validation { body, .. }
            | ApiError::Server { body, .. } => body,
            _ => return None,
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("error_description")
            .or_else(|| value.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}
