//! Quip automation API client
//!
//! A thin typed layer over the HTTP endpoints used to publish, update and
//! import documents:
//!
//! - `POST /1/threads/new-document` and `POST /1/threads/edit-document`
//! - `GET /2/threads/{id}/html` with cursor pagination
//! - `GET /2/threads/{id}`, `/1/threads/recent`, `/1/threads/search`
//! - `GET /1/blob/...` for images
//!
//! Errors are classified into [`ErrorKind`] so callers can react to
//! authentication or missing-document failures without inspecting statuses.

mod client;
mod error;
mod handle;
mod types;

pub use client::{QuipClient, DEFAULT_BLOB_CONTENT_TYPE, DEFAULT_HOSTNAME, RECENT_THREAD_COUNT};
pub use error::{ApiError, ErrorKind, Result};
pub use handle::{link_host, DocumentHandle};
pub use types::{
    Blob, DocumentFormat, EditOperation, EditResponse, Location, ThreadInfo, ThreadResponse,
};
