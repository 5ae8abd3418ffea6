//! Two-way sync between Obsidian notes and Quip documents.
//!
//! - Outbound: a note is rendered by the host, post-processed into
//!   Quip-ready HTML and either published as a new document or used to
//!   replace the body of the linked one (see [`reconcile`]).
//! - Inbound: a document's HTML is sanitized, converted to Markdown and
//!   written into the vault with its images.

pub mod error;
pub mod host;
pub mod html;
pub mod inbound;
pub mod markdown;
pub mod outbound;
pub mod plugin;
pub mod recent;
pub mod reconcile;
pub mod settings;
pub mod vault;

pub use error::{DeletionFailure, SyncError, TransformError};
pub use host::{note_title, LinkResolver, Notifier, RenderError, Renderer, VaultIndex};
pub use inbound::{ImportedNote, Importer};
pub use markdown::{GfmConverter, MarkdownConverter};
pub use outbound::{OutboundOptions, OutboundTransformer, LINK_KEY};
pub use plugin::{Command, CommandOutcome, Host, QuipPlugin};
pub use recent::{ImportPicker, RecentThreadCache, Suggestion, ThreadDirectory};
pub use reconcile::{DeletionPlan, ReadAfterWrite, ReconcileReport, Reconciler, RemoteDocuments};
pub use settings::{Settings, SettingsError};
pub use vault::{MemoryVault, Vault, VaultError};
