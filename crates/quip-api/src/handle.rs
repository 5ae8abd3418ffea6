//! Document handles: the thread id or secret path that names a Quip document.

use crate::error::{ApiError, Result};
use std::fmt;

/// Identifier accepted wherever Quip expects a `thread_id`.
///
/// Quip treats the secret path from a document URL and the opaque thread id
/// interchangeably.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentHandle {
    SecretPath(String),
    ThreadId(String),
}

impl DocumentHandle {
    /// Extract the secret path from a document link such as
    /// `https://example.quip.com/AbCdEf123/My-Document`.
    ///
    /// A bare token with no slashes is accepted as a secret path.
    pub fn from_link(link: &str) -> Result<Self> {
        let link = link.trim();
        let segment = if link.contains("://") {
            let parsed = url::Url::parse(link).map_err(|_| ApiError::InvalidLink(link.to_string()))?;
            parsed
                .path_segments()
                .and_then(|mut segments| segments.find(|s| !s.is_empty()))
                .map(str::to_string)
        } else {
            link.trim_start_matches('/')
                .split(['/', '?', '#'])
                .next()
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match segment {
            Some(secret) if secret.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Ok(DocumentHandle::SecretPath(secret))
            }
            _ => Err(ApiError::InvalidLink(link.to_string())),
        }
    }

    pub fn thread_id(id: impl Into<String>) -> Self {
        DocumentHandle::ThreadId(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            DocumentHandle::SecretPath(s) | DocumentHandle::ThreadId(s) => s,
        }
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host component of a link, lowercased.
pub fn link_host(link: &str) -> Option<String> {
    url::Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}
