//! Plugin lifecycle and the four user commands.
//!
//! Each command is a separate invocation: it reports progress and its
//! outcome through the host's [`Notifier`] and never panics on a remote
//! failure.

use crate::error::SyncError;
use crate::host::{note_title, LinkResolver, Notifier, Renderer};
use crate::html::escape_html;
use crate::inbound::{ImportedNote, Importer};
use crate::markdown::MarkdownConverter;
use crate::outbound::{OutboundTransformer, LINK_KEY};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::recent::{ImportPicker, RecentThreadCache};
use crate::settings::Settings;
use crate::vault::{self, Vault};
use quip_api::{DocumentHandle, QuipClient};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PublishHtml,
    UpdateHtml,
    Import,
    Refresh,
}

impl Command {
    pub const ALL: [Command; 4] = [
        Command::PublishHtml,
        Command::UpdateHtml,
        Command::Import,
        Command::Refresh,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Command::PublishHtml => "publish-html",
            Command::UpdateHtml => "update-html",
            Command::Import => "import",
            Command::Refresh => "refresh",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Command::PublishHtml => "Publish as a new Quip document",
            Command::UpdateHtml => "Update the linked Quip document",
            Command::Import => "Import a Quip document",
            Command::Refresh => "Refresh from the linked Quip document",
        }
    }

    pub fn from_id(id: &str) -> Option<Command> {
        Command::ALL.into_iter().find(|c| c.id() == id)
    }
}

/// Result of a successful command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Published { path: String, link: String },
    Updated { path: String, link: String, removed_sections: usize },
    Imported(ImportedNote),
}

/// Host-provided collaborators.
#[derive(Clone)]
pub struct Host {
    pub vault: Arc<dyn Vault>,
    pub resolver: Arc<dyn LinkResolver>,
    pub renderer: Arc<dyn Renderer>,
    pub converter: Arc<dyn MarkdownConverter>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct QuipPlugin {
    settings: Settings,
    host: Host,
    recent: RecentThreadCache,
}

impl QuipPlugin {
    pub fn new(settings: Settings, host: Host) -> Self {
        Self {
            settings,
            host,
            recent: RecentThreadCache::new(),
        }
    }

    /// Warm the recent-documents cache. Never fails; an unconfigured or
    /// unreachable server only leaves the cache empty.
    pub async fn load(&self) {
        match self.settings.client() {
            Ok(client) => self.recent.refresh(&client).await,
            Err(e) => tracing::debug!(error = %e, "Skipping recent documents"),
        }
        tracing::info!(settings = ?self.settings, "Quip plugin loaded");
    }

    pub async fn unload(&self) {
        self.recent.clear().await;
        tracing::info!("Quip plugin unloaded");
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn recent(&self) -> &RecentThreadCache {
        &self.recent
    }

    /// Whether `command` applies to the active note (None when no note is open).
    pub async fn is_available(&self, command: Command, active_path: Option<&str>) -> bool {
        match (command, active_path) {
            (Command::Import, _) => true,
            (_, None) => false,
            (Command::PublishHtml, Some(path)) => path.ends_with(".md"),
            (Command::UpdateHtml | Command::Refresh, Some(path)) => self.linked_document(path).await.is_some(),
        }
    }

    async fn linked_document(&self, path: &str) -> Option<String> {
        vault::frontmatter_string(self.host.vault.as_ref(), path, LINK_KEY)
            .await
            .ok()
            .flatten()
            .filter(|link| !link.trim().is_empty())
    }

    /// Publish the note at `path` as a new document.
    pub async fn publish_html(&self, path: &str) -> Result<CommandOutcome, SyncError> {
        self.report(self.try_publish(path)).await
    }

    /// Replace the body of the document linked from the note at `path`.
    pub async fn update_html(&self, path: &str) -> Result<CommandOutcome, SyncError> {
        self.report(self.try_update(path)).await
    }

    /// Import the document at `link` into `folder`.
    pub async fn import(&self, link: &str, folder: &str) -> Result<CommandOutcome, SyncError> {
        self.report(self.try_import(link, folder)).await
    }

    /// Re-import the document linked from the note at `path`.
    pub async fn refresh(&self, path: &str) -> Result<CommandOutcome, SyncError> {
        self.report(self.try_refresh(path)).await
    }

    /// Suggestions for the import prompt.
    pub fn import_picker<'a>(&'a self, client: &'a QuipClient) -> ImportPicker<'a> {
        ImportPicker::new(client, &self.recent)
    }

    async fn report(
        &self,
        command: impl Future<Output = Result<CommandOutcome, SyncError>>,
    ) -> Result<CommandOutcome, SyncError> {
        let result = command.await;
        let notifier = &self.host.notifier;
        match &result {
            Ok(CommandOutcome::Published { link, .. }) => notifier.success("Published to Quip", link),
            Ok(CommandOutcome::Updated { link, .. }) => notifier.success("Updated Quip document", link),
            Ok(CommandOutcome::Imported(note)) => {
                notifier.notice(&format!("Imported {} to {}", note.title, note.path))
            }
            Err(e) => {
                tracing::error!(error = %e, "Quip command failed");
                notifier.notice(&e.user_message());
            }
        }
        result
    }

    async fn try_publish(&self, path: &str) -> Result<CommandOutcome, SyncError> {
        let client = self.settings.client()?;
        self.host.notifier.notice("Publishing to Quip...");

        let (html, title) = self.document_html(path).await?;
        let title = self.settings.prepend_title.then_some(title);
        let response = client.new_html_document(&html, title.as_deref()).await?;
        let link = response.thread.link;

        if self.settings.add_link {
            let value = Value::String(link.clone());
            vault::mutate_frontmatter(self.host.vault.as_ref(), path, move |mut fm| {
                fm.insert(LINK_KEY.to_string(), value);
                fm
            })
            .await?;
        }

        tracing::info!(path, link = %link, "Published note");
        Ok(CommandOutcome::Published {
            path: path.to_string(),
            link,
        })
    }

    async fn try_update(&self, path: &str) -> Result<CommandOutcome, SyncError> {
        let link = self
            .linked_document(path)
            .await
            .ok_or_else(|| SyncError::MissingLink {
                path: path.to_string(),
            })?;
        let client = self.settings.client()?;
        let handle = DocumentHandle::from_link(&link)?;
        self.host.notifier.notice("Updating Quip document...");

        let (html, _) = self.document_html(path).await?;
        let ReconcileReport {
            removed_sections,
            thread,
            ..
        } = Reconciler::new(&client).reconcile(&handle, &html).await?;
        let link = if thread.link.is_empty() { link } else { thread.link };

        tracing::info!(path, link = %link, removed_sections, "Updated linked document");
        Ok(CommandOutcome::Updated {
            path: path.to_string(),
            link,
            removed_sections,
        })
    }

    async fn try_import(&self, link: &str, folder: &str) -> Result<CommandOutcome, SyncError> {
        let client = self.settings.client()?;
        self.host.notifier.notice("Importing from Quip...");
        let note = self.importer(&client).import(link, folder).await?;
        Ok(CommandOutcome::Imported(note))
    }

    async fn try_refresh(&self, path: &str) -> Result<CommandOutcome, SyncError> {
        let client = self.settings.client()?;
        self.host.notifier.notice("Refreshing from Quip...");
        let note = self.importer(&client).refresh(path).await?;
        Ok(CommandOutcome::Imported(note))
    }

    fn importer<'a>(&'a self, client: &'a QuipClient) -> Importer<'a> {
        Importer::new(
            client,
            self.host.vault.as_ref(),
            self.host.resolver.as_ref(),
            self.host.converter.as_ref(),
        )
    }

    /// Rendered HTML for the note, with the title heading when configured,
    /// and the note title.
    async fn document_html(&self, path: &str) -> Result<(String, String), SyncError> {
        let transformer = OutboundTransformer::new(
            self.host.vault.as_ref(),
            self.host.resolver.as_ref(),
            self.host.renderer.as_ref(),
            self.settings.outbound_options(),
        );
        let html = transformer.render_file(path).await?;
        let frontmatter = vault::read_frontmatter(self.host.vault.as_ref(), path).await?;
        let title = note_title(&frontmatter, path);
        let html = if self.settings.prepend_title {
            format!("<h1>{}</h1>{}", escape_html(&title), html)
        } else {
            html
        };
        Ok((html, title))
    }
}
