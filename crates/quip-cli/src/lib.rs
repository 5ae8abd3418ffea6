//! Native host for quip-sync: a vault on disk, a CommonMark renderer with
//! Obsidian's link and embed markup, and terminal notifications.

pub mod config;
pub mod native_vault;
pub mod notifier;
pub mod render;

pub use config::{Config, ConfigError};
pub use native_vault::NativeVault;
pub use notifier::TerminalNotifier;
pub use render::ObsidianRenderer;

use quip_sync::{GfmConverter, Host, Vault, VaultIndex};
use std::path::PathBuf;
use std::sync::Arc;

/// Host collaborators for the vault at `root`.
pub fn native_host(root: PathBuf) -> Host {
    let vault: Arc<dyn Vault> = Arc::new(NativeVault::new(root));
    Host {
        resolver: Arc::new(VaultIndex::new(vault.clone())),
        vault,
        renderer: Arc::new(ObsidianRenderer),
        converter: Arc::new(GfmConverter::default()),
        notifier: Arc::new(TerminalNotifier),
    }
}
