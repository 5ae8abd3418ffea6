//! Rendered note → Quip-ready HTML.
//!
//! Post-processing runs in a fixed order over the host renderer's output:
//!
//! 1. internal links get the target note's Quip URL when it has one
//! 2. image placeholders (`span[src$=.png]` etc.) become `<img>`
//! 3. with `inline_embeds`: images become data URIs, note embeds are
//!    rendered recursively in place (or linked when they would re-enter an
//!    ancestor)
//! 4. `blockquote > p:only-child` is unwrapped
//! 5. `<br>` goes between adjacent paragraphs
//! 6. with `remove_yaml`: front matter elements are dropped

use crate::error::{SyncError, TransformError};
use crate::host::{LinkResolver, Renderer};
use crate::html::{Document, NodeId};
use crate::vault::{self, Vault};
use base64::Engine as _;
use futures::future::BoxFuture;

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif"];

/// Front matter key holding a note's Quip document URL.
pub const LINK_KEY: &str = "quip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundOptions {
    pub inline_embeds: bool,
    pub remove_yaml: bool,
}

impl Default for OutboundOptions {
    fn default() -> Self {
        Self {
            inline_embeds: true,
            remove_yaml: true,
        }
    }
}

pub struct OutboundTransformer<'a> {
    vault: &'a dyn Vault,
    resolver: &'a dyn LinkResolver,
    renderer: &'a dyn Renderer,
    options: OutboundOptions,
}

impl<'a> OutboundTransformer<'a> {
    pub fn new(
        vault: &'a dyn Vault,
        resolver: &'a dyn LinkResolver,
        renderer: &'a dyn Renderer,
        options: OutboundOptions,
    ) -> Self {
        Self {
            vault,
            resolver,
            renderer,
            options,
        }
    }

    /// Render the note at `path` into HTML ready to send to Quip.
    pub async fn render_file(&self, path: &str) -> Result<String, SyncError> {
        self.render_note(path, &[]).await
    }

    /// `ancestors` are the notes currently being expanded above this one.
    fn render_note<'b>(
        &'b self,
        path: &'b str,
        ancestors: &'b [String],
    ) -> BoxFuture<'b, Result<String, SyncError>> {
        Box::pin(async move {
            let markdown = self.vault.read_to_string(path).await?;
            let html = self.renderer.render(&markdown, path).await?;

            let mut chain = ancestors.to_vec();
            chain.push(path.to_string());

            let mut doc = Document::parse(&html);
            self.postprocess(&mut doc, path, &chain).await;
            Ok(doc.to_html())
        })
    }

    async fn postprocess(&self, doc: &mut Document, path: &str, chain: &[String]) {
        self.fix_internal_links(doc, path).await;
        convert_image_placeholders(doc);
        if self.options.inline_embeds {
            self.inline_images(doc, path).await;
            self.inline_note_embeds(doc, path, chain).await;
        }
        unwrap_lone_blockquote_paragraphs(doc);
        separate_adjacent_paragraphs(doc);
        if self.options.remove_yaml {
            remove_frontmatter(doc);
        }
    }

    async fn fix_internal_links(&self, doc: &mut Document, path: &str) {
        let links = doc.select(|el| el.name == "a" && el.has_class("internal-link"));
        for link in links {
            let Some(target) = doc.attr(link, "data-href").map(str::to_string) else {
                continue;
            };
            let Some(resolved) = self
                .resolver
                .resolve_link(wiki_links::link_path(&target), path)
                .await
            else {
                continue;
            };
            match vault::frontmatter_string(self.vault, &resolved, LINK_KEY).await {
                Ok(Some(url)) => doc.set_attr(link, "href", &url),
                Ok(None) => {}
                Err(e) => tracing::debug!("Could not read front matter of {}: {}", resolved, e),
            }
        }
    }

    async fn inline_images(&self, doc: &mut Document, path: &str) {
        let images = doc.select(|el| el.name == "img" && el.has_class("internal-embed"));
        for img in images {
            let Some(src) = doc.attr(img, "src").map(str::to_string) else {
                continue;
            };
            match self.image_data_uri(&src, path).await {
                Ok(uri) => doc.set_attr(img, "src", &uri),
                Err(e) => tracing::warn!("Leaving image as-is: {}", e),
            }
        }
    }

    async fn image_data_uri(&self, src: &str, path: &str) -> Result<String, TransformError> {
        let resolved = self
            .resolver
            .resolve_link(wiki_links::link_path(src), path)
            .await
            .ok_or_else(|| TransformError::Unresolved(src.to_string()))?;
        let bytes = self
            .vault
            .read(&resolved)
            .await
            .map_err(|e| TransformError::Unreadable {
                path: resolved.clone(),
                reason: e.to_string(),
            })?;
        let mime = image_mime(&resolved);
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Ok(format!("data:{};base64,{}", mime, encoded))
    }

    async fn inline_note_embeds(&self, doc: &mut Document, path: &str, chain: &[String]) {
        let embeds = doc.select(|el| {
            (el.name == "span" || el.name == "div")
                && el.has_class("internal-embed")
                && el.attr("src").is_some()
        });
        for embed in embeds {
            let Some(src) = doc.attr(embed, "src").map(str::to_string) else {
                continue;
            };
            let Some(resolved) = self
                .resolver
                .resolve_link(wiki_links::link_path(&src), path)
                .await
            else {
                tracing::warn!("{}", TransformError::Unresolved(src));
                continue;
            };

            if chain.contains(&resolved) {
                tracing::debug!("Embed of {} would recurse; linking instead", resolved);
                let published = vault::frontmatter_string(self.vault, &resolved, LINK_KEY).await;
                let href = match published {
                    Ok(Some(url)) => url,
                    Ok(None) => resolved,
                    Err(e) => {
                        tracing::debug!("Could not read front matter of {}: {}", resolved, e);
                        resolved
                    }
                };
                let inner = doc.children(embed).to_vec();
                let link = doc.create_element("a", vec![("href".to_string(), href)]);
                for child in inner {
                    doc.append_child(link, child);
                }
                doc.replace_with(embed, &[link]);
                continue;
            }

            match self.render_note(&resolved, chain).await {
                Ok(html) => {
                    let fragment = Document::parse(&html);
                    let nodes = doc.import_fragment(&fragment);
                    doc.replace_with(embed, &nodes);
                }
                Err(e) => tracing::warn!(
                    "{}",
                    TransformError::Unreadable {
                        path: resolved,
                        reason: e.to_string(),
                    }
                ),
            }
        }
    }
}

/// Obsidian leaves unloaded image embeds as `<span src="...">`.
fn convert_image_placeholders(doc: &mut Document) {
    let spans = doc.select(|el| {
        el.name == "span"
            && el.attr("src").is_some_and(|src| {
                let src = src.to_ascii_lowercase();
                IMAGE_EXTENSIONS.iter().any(|ext| src.ends_with(ext))
            })
    });
    for span in spans {
        let mut attrs = Vec::new();
        for name in ["src", "class", "alt"] {
            if let Some(value) = doc.attr(span, name) {
                attrs.push((name.to_string(), value.to_string()));
            }
        }
        let img = doc.create_element("img", attrs);
        doc.replace_with(span, &[img]);
    }
}

fn unwrap_lone_blockquote_paragraphs(doc: &mut Document) {
    let lone: Vec<NodeId> = doc
        .elements_by_tag("blockquote")
        .into_iter()
        .filter_map(|quote| match doc.element_children(quote).as_slice() {
            [only] if doc.is_element(*only, "p") => Some(*only),
            _ => None,
        })
        .collect();
    for p in lone {
        doc.unwrap(p);
    }
}

/// Quip collapses the spacing between consecutive paragraphs.
fn separate_adjacent_paragraphs(doc: &mut Document) {
    let following: Vec<NodeId> = doc
        .elements_by_tag("p")
        .into_iter()
        .filter(|&p| {
            doc.previous_element_sibling(p)
                .is_some_and(|prev| doc.is_element(prev, "p"))
        })
        .collect();
    for p in following {
        let br = doc.create_element("br", Vec::new());
        doc.insert_before(p, br);
    }
}

fn remove_frontmatter(doc: &mut Document) {
    let blocks = doc.select(|el| el.has_class("frontmatter") || el.has_class("frontmatter-container"));
    for block in blocks {
        doc.detach(block);
    }
}

/// MIME type for an image file, by extension.
pub fn image_mime(path: &str) -> &'static str {
    match obsidian_fs::extension(path).as_deref() {
        Some("bmp") => "image/bmp",
        Some("gif") => "image/gif",
        Some("jpeg") | Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
