//! HTTP client for the Quip automation API.
//!
//! Every request carries `Authorization: Bearer <token>`. Non-success
//! statuses are classified by [`ApiError::from_status`]; the raw body is kept
//! for diagnostics.

use crate::error::{ApiError, Result};
use crate::handle::DocumentHandle;
use crate::types::{Blob, DocumentFormat, EditOperation, EditResponse, HtmlPage, ThreadResponse};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};

/// Hostname the plugin ships with; never a usable endpoint.
pub const DEFAULT_HOSTNAME: &str = "platform.quip.com";

/// Content type assumed for blobs served without one.
pub const DEFAULT_BLOB_CONTENT_TYPE: &str = "image/png";

/// Default page size for [`QuipClient::recent_threads`].
pub const RECENT_THREAD_COUNT: usize = 50;

#[derive(Debug, Clone)]
pub struct QuipClient {
    hostname: String,
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl QuipClient {
    /// Build a client for `hostname`.
    ///
    /// Fails with [`ApiError::Configuration`] before any request when the
    /// token is empty or the hostname is empty or still the shipped default.
    pub fn new(hostname: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("obsidian-quip/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Self::with_http_client(hostname, token, http)
    }

    /// Like [`QuipClient::new`] with a caller-supplied `reqwest::Client`.
    pub fn with_http_client(hostname: &str, token: &str, http: reqwest::Client) -> Result<Self> {
        let hostname = hostname.trim();
        let token = token.trim();
        if token.is_empty() {
            return Err(ApiError::Configuration("token"));
        }
        if hostname.is_empty() || hostname.eq_ignore_ascii_case(DEFAULT_HOSTNAME) {
            return Err(ApiError::Configuration("hostname"));
        }

        let base_url = if hostname.starts_with("http://") || hostname.starts_with("https://") {
            hostname.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", hostname.trim_end_matches('/'))
        };

        Ok(Self {
            hostname: hostname.to_string(),
            base_url,
            token: token.to_string(),
            http,
        })
    }

    /// Hostname as configured (scheme included if one was given).
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new document from `content`.
    pub async fn create_document(
        &self,
        content: &str,
        format: DocumentFormat,
        title: Option<&str>,
    ) -> Result<ThreadResponse> {
        let mut form = vec![
            ("content", content.to_string()),
            ("format", format.as_str().to_string()),
        ];
        if let Some(title) = title.filter(|t| !t.is_empty()) {
            form.push(("title", title.to_string()));
        }
        tracing::debug!(format = format.as_str(), bytes = content.len(), "Creating Quip document");
        self.post_form("/1/threads/new-document", &form).await
    }

    pub async fn new_html_document(&self, html: &str, title: Option<&str>) -> Result<ThreadResponse> {
        self.create_document(html, DocumentFormat::Html, title).await
    }

    /// Fetch a document's complete HTML, following pagination cursors.
    ///
    /// Pages are concatenated in order. A failure on any page discards what
    /// was read so far.
    pub async fn fetch_full_html(&self, handle: &DocumentHandle) -> Result<String> {
        let base = format!("/2/threads/{}/html", urlencoding::encode(handle.as_str()));
        let mut html = String::new();
        let mut cursor: Option<String> = None;
        let mut seen = HashSet::new();
        let mut pages = 0usize;

        loop {
            let path = match &cursor {
                Some(cursor) => format!("{}?cursor={}", base, urlencoding::encode(cursor)),
                None => base.clone(),
            };
            let page: HtmlPage = self.get_json(&path).await?;
            pages += 1;
            html.push_str(&page.html);

            match page.response_metadata.next_cursor.filter(|c| !c.is_empty()) {
                Some(next) => {
                    if !seen.insert(next.clone()) {
                        return Err(ApiError::CursorLoop(next));
                    }
                    cursor = Some(next);
                }
                None => break,
            }
        }

        tracing::debug!(handle = %handle, pages, bytes = html.len(), "Fetched document HTML");
        Ok(html)
    }

    /// Apply one edit. The response carries the document's HTML after the edit.
    pub async fn edit_document(
        &self,
        handle: &DocumentHandle,
        operation: EditOperation,
    ) -> Result<EditResponse> {
        let mut form = vec![("thread_id", handle.as_str().to_string())];
        form.extend(operation.form_fields());
        tracing::debug!(
            handle = %handle,
            location = operation.location().code(),
            "Editing Quip document"
        );
        self.post_form("/1/threads/edit-document", &form).await
    }

    pub async fn append_html(&self, handle: &DocumentHandle, html: &str) -> Result<EditResponse> {
        self.edit_document(handle, EditOperation::Append(html.to_string())).await
    }

    pub async fn prepend_html(&self, handle: &DocumentHandle, html: &str) -> Result<EditResponse> {
        self.edit_document(handle, EditOperation::Prepend(html.to_string())).await
    }

    pub async fn delete_range(&self, handle: &DocumentHandle, range: &str) -> Result<EditResponse> {
        self.edit_document(handle, EditOperation::DeleteRange(range.to_string())).await
    }

    pub async fn delete_section(&self, handle: &DocumentHandle, section_id: &str) -> Result<EditResponse> {
        self.edit_document(handle, EditOperation::DeleteSection(section_id.to_string()))
            .await
    }

    /// Download a blob referenced by an image `src`.
    ///
    /// `path` is either server-relative (`/blob/...`) or an absolute URL on
    /// any host; only its path and query are used.
    pub async fn fetch_blob(&self, path: &str) -> Result<Blob> {
        let relative = blob_request_path(path);
        let response = self.send(self.http.get(self.url(&relative)), &relative).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_BLOB_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        tracing::debug!(path = %relative, bytes = bytes.len(), content_type = %content_type, "Fetched blob");
        Ok(Blob { bytes, content_type })
    }

    /// Search documents whose titles match `query`.
    pub async fn search_titles(&self, query: &str) -> Result<Vec<ThreadResponse>> {
        let path = format!(
            "/1/threads/search?only_match_titles=true&query={}",
            urlencoding::encode(query)
        );
        self.get_json(&path).await
    }

    /// Recently viewed threads keyed by thread id.
    pub async fn recent_threads(&self, count: usize) -> Result<HashMap<String, ThreadResponse>> {
        self.get_json(&format!("/1/threads/recent?count={}", count)).await
    }

    pub async fn get_thread(&self, handle: &DocumentHandle) -> Result<ThreadResponse> {
        let path = format!("/2/threads/{}", urlencoding::encode(handle.as_str()));
        self.get_json(&path).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.http.get(self.url(path)), path).await?;
        decode(response).await
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T> {
        let response = self
            .send(self.http.post(self.url(path)).form(form), path)
            .await?;
        decode(response).await
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(path, status = status.as_u16(), "Quip request failed");
        Err(ApiError::from_status(status.as_u16(), path, body))
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// `/1` + the path and query of a blob reference.
fn blob_request_path(src: &str) -> String {
    let relative = match url::Url::parse(src) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => src.to_string(),
    };
    if relative.starts_with('/') {
        format!("/1{}", relative)
    } else {
        format!("/1/{}", relative)
    }
}
