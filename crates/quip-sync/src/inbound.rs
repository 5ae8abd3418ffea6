//! Quip document → vault note.
//!
//! The document HTML is sanitized, links to documents that already have a
//! note in the vault are pointed at that note, images are downloaded next to
//! the note, and the result is converted to Markdown with import metadata in
//! the front matter.

use crate::error::{SyncError, TransformError};
use crate::host::LinkResolver;
use crate::html::Document;
use crate::markdown::MarkdownConverter;
use crate::outbound::LINK_KEY;
use crate::vault::{self, Vault};
use obsidian_fs::{
    build_note_with_frontmatter, join_path, parent_folder, sanitize_file_name,
    try_parse_frontmatter, Frontmatter,
};
use quip_api::{link_host, DocumentHandle, QuipClient, ThreadInfo};
use serde_json::{json, Value};

/// Front matter key holding the imported thread's id and update time.
pub const IMPORTED_KEY: &str = "quip_thread_imported";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedNote {
    pub path: String,
    pub title: String,
    pub link: String,
    /// Images written next to the note
    pub attachments: Vec<String>,
}

pub struct Importer<'a> {
    client: &'a QuipClient,
    vault: &'a dyn Vault,
    resolver: &'a dyn LinkResolver,
    converter: &'a dyn MarkdownConverter,
}

struct FetchedNote {
    title: String,
    markdown: String,
    frontmatter: Frontmatter,
    attachments: Vec<String>,
}

impl<'a> Importer<'a> {
    pub fn new(
        client: &'a QuipClient,
        vault: &'a dyn Vault,
        resolver: &'a dyn LinkResolver,
        converter: &'a dyn MarkdownConverter,
    ) -> Self {
        Self {
            client,
            vault,
            resolver,
            converter,
        }
    }

    /// Import the document at `link` as a new note in `folder`.
    ///
    /// The note is named after the document title; an existing note with
    /// that name is overwritten.
    pub async fn import(&self, link: &str, folder: &str) -> Result<ImportedNote, SyncError> {
        let fetched = self.fetch(link, folder).await?;
        let path = join_path(folder, &format!("{}.md", sanitize_file_name(&fetched.title)));
        let note = build_note_with_frontmatter(&fetched.frontmatter, &fetched.markdown)?;
        self.vault.write(&path, note.as_bytes()).await?;

        tracing::info!(path = %path, link, "Imported Quip document");
        Ok(ImportedNote {
            path,
            title: fetched.title,
            link: link.to_string(),
            attachments: fetched.attachments,
        })
    }

    /// Re-import the document a note was imported from, in place.
    ///
    /// The body is replaced; front matter keys the import does not set are
    /// kept.
    pub async fn refresh(&self, path: &str) -> Result<ImportedNote, SyncError> {
        let link = vault::frontmatter_string(self.vault, path, LINK_KEY)
            .await?
            .ok_or_else(|| SyncError::MissingLink {
                path: path.to_string(),
            })?;

        let raw = self.vault.read_to_string(path).await?;
        let mut frontmatter = try_parse_frontmatter(&raw)?.frontmatter.unwrap_or_default();

        let fetched = self.fetch(&link, parent_folder(path)).await?;
        frontmatter.extend(fetched.frontmatter);
        let note = build_note_with_frontmatter(&frontmatter, &fetched.markdown)?;
        self.vault.write(path, note.as_bytes()).await?;

        tracing::info!(path, link = %link, "Refreshed imported note");
        Ok(ImportedNote {
            path: path.to_string(),
            title: fetched.title,
            link,
            attachments: fetched.attachments,
        })
    }

    async fn fetch(&self, link: &str, folder: &str) -> Result<FetchedNote, SyncError> {
        let handle = DocumentHandle::from_link(link)?;
        let html = self.client.fetch_full_html(&handle).await?;
        let thread = self.client.get_thread(&handle).await?.thread;
        let title = if thread.title.trim().is_empty() {
            handle.to_string()
        } else {
            thread.title.clone()
        };

        let mut doc = Document::parse(&html);
        doc.sanitize();
        self.link_local_notes(&mut doc).await;
        let attachments = self.download_images(&mut doc, &title, folder).await?;

        Ok(FetchedNote {
            markdown: self.converter.convert(&doc),
            frontmatter: imported_frontmatter(&title, link, &thread),
            title,
            attachments,
        })
    }

    /// Point links to Quip documents at the vault note linked to them.
    async fn link_local_notes(&self, doc: &mut Document) {
        let hostname = self.client.hostname().to_ascii_lowercase();
        for anchor in doc.select(|el| el.name == "a" && el.attr("href").is_some()) {
            let Some(href) = doc.attr(anchor, "href").map(str::to_string) else {
                continue;
            };
            let Some(host) = link_host(&href) else {
                continue;
            };
            if !hostname.contains(&host) {
                continue;
            }
            let Ok(target) = DocumentHandle::from_link(&href) else {
                continue;
            };
            let text = doc.text_content(anchor);
            if let Some(note) = self.find_linked_note(text.trim(), target.as_str()).await {
                tracing::debug!(href = %href, note = %note, "Linked Quip document to local note");
                doc.set_attr(anchor, "href", &urlencoding::encode(&note));
            }
        }
    }

    /// The note titled `title` if it links to `secret`, else any note that does.
    async fn find_linked_note(&self, title: &str, secret: &str) -> Option<String> {
        if !title.is_empty() {
            if let Some(path) = self.resolver.resolve_link(title, "").await {
                if self.links_to(&path, secret).await {
                    return Some(path);
                }
            }
        }
        let notes = self.vault.markdown_files().await.ok()?;
        for path in notes {
            if self.links_to(&path, secret).await {
                return Some(path);
            }
        }
        None
    }

    async fn links_to(&self, path: &str, secret: &str) -> bool {
        vault::frontmatter_string(self.vault, path, LINK_KEY)
            .await
            .ok()
            .flatten()
            .is_some_and(|link| link.contains(secret))
    }

    /// Download Quip-hosted images into `folder` and point `src` at the copy.
    async fn download_images(
        &self,
        doc: &mut Document,
        title: &str,
        folder: &str,
    ) -> Result<Vec<String>, SyncError> {
        let hostname = self.client.hostname().to_ascii_lowercase();
        let mut written = Vec::new();
        for img in doc.elements_by_tag("img") {
            let Some(src) = doc.attr(img, "src").map(str::to_string) else {
                continue;
            };
            if src.is_empty() || src.starts_with("data:") {
                continue;
            }
            if let Some(host) = link_host(&src) {
                if !hostname.contains(&host) {
                    continue;
                }
            }

            let blob = match self.client.fetch_blob(&src).await {
                Ok(blob) => blob,
                Err(e) => {
                    let err = TransformError::Download {
                        src: src.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!(error = %err, "Skipping image");
                    continue;
                }
            };
            let name = attachment_name(title, &src, &blob.extension());
            let path = join_path(folder, &name);
            self.vault.write(&path, &blob.bytes).await?;
            doc.set_attr(img, "src", &name);
            written.push(path);
        }
        Ok(written)
    }
}

/// File name for an image downloaded from `src` into a note titled `title`:
/// spaces in the title become `_`, slashes in the source path become `-`.
pub fn attachment_name(title: &str, src: &str, extension: &str) -> String {
    let source = match url::Url::parse(src) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => src.to_string(),
    };
    sanitize_file_name(&format!(
        "{}{}.{}",
        title.replace(' ', "_"),
        source.replace('/', "-"),
        extension
    ))
}

fn imported_frontmatter(title: &str, link: &str, thread: &ThreadInfo) -> Frontmatter {
    let mut frontmatter = Frontmatter::new();
    frontmatter.insert("title".to_string(), Value::String(title.to_string()));
    frontmatter.insert(LINK_KEY.to_string(), Value::String(link.to_string()));
    frontmatter.insert(
        IMPORTED_KEY.to_string(),
        json!({
            "id": thread.id,
            "updated_usec": thread.updated_usec,
            "updated_datetime": format_updated(thread.updated_usec),
        }),
    );
    frontmatter
}

/// Local date and time of a microsecond timestamp, "" for 0.
pub fn format_updated(updated_usec: i64) -> String {
    if updated_usec == 0 {
        return String::new();
    }
    chrono::DateTime::from_timestamp_micros(updated_usec)
        .map(|dt| {
            dt.with_timezone(&chrono::Local)
                .format("%-m/%-d/%Y, %-I:%M:%S %p")
                .to_string()
        })
        .unwrap_or_default()
}
