//! quip: publish Obsidian notes to Quip and import Quip documents.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use obsidian_fs::{ensure_markdown_extension, normalize_path};
use quip_cli::{native_host, Config};
use quip_sync::{CommandOutcome, QuipPlugin, SyncError};
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "quip", version)]
#[command(about = "Publish Obsidian notes to Quip and import Quip documents")]
struct Cli {
    /// Path to the vault directory (defaults to OBSIDIAN_VAULT_PATH)
    #[arg(long, global = true)]
    vault: Option<String>,

    /// Settings file (defaults to the plugin's data.json inside the vault)
    #[arg(long, global = true)]
    settings: Option<String>,

    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a note as a new Quip document
    Publish { note: String },
    /// Replace the content of the document a note is linked to
    Update { note: String },
    /// Import a Quip document as a new note
    Import {
        link: String,
        /// Vault folder for the note and its images
        #[arg(long, default_value = "")]
        folder: String,
    },
    /// Re-import the document a note was imported from
    Refresh { note: String },
    /// List recently viewed documents
    Recent,
    /// Suggest documents to import for a query
    Search { query: String },
    /// Show or change the saved settings
    Settings(SettingsArgs),
}

#[derive(Args, Debug)]
struct SettingsArgs {
    #[arg(long)]
    hostname: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    remove_yaml: Option<bool>,
    #[arg(long)]
    add_link: Option<bool>,
    #[arg(long)]
    inline_embeds: Option<bool>,
    #[arg(long)]
    prepend_title: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise warn (or debug with --verbose)
    let default_filter = if cli.verbose {
        "info,quip=debug,quip_cli=debug,quip_sync=debug,quip_api=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::resolve(cli.vault.as_deref(), cli.settings.as_deref())?;
    tracing::debug!(vault = %config.vault_path.display(), settings = %config.settings_path.display(), "Resolved configuration");

    let settings = config.load_settings().await?;
    let plugin = QuipPlugin::new(settings, native_host(config.vault_path.clone()));

    let result = match cli.command {
        Commands::Publish { note } => plugin.publish_html(&note_path(&config.vault_path, &note)).await,
        Commands::Update { note } => plugin.update_html(&note_path(&config.vault_path, &note)).await,
        Commands::Import { link, folder } => plugin.import(&link, &normalize_path(&folder)).await,
        Commands::Refresh { note } => plugin.refresh(&note_path(&config.vault_path, &note)).await,
        Commands::Recent => {
            plugin.load().await;
            for thread in plugin.recent().threads().await {
                println!("{}\t{}", thread.link, thread.title);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Search { query } => {
            let client = match plugin.settings().client() {
                Ok(client) => client,
                Err(e) => {
                    eprintln!("{}", SyncError::from(e).user_message());
                    return Ok(ExitCode::FAILURE);
                }
            };
            plugin.load().await;
            let mut picker = plugin.import_picker(&client);
            for suggestion in picker.suggest(&query).await {
                match suggestion.title {
                    Some(title) => println!("{}\t{}", suggestion.link, title),
                    None => println!("{}", suggestion.link),
                }
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Settings(args) => return edit_settings(&config, args).await,
    };
    plugin.unload().await;

    match result {
        Ok(CommandOutcome::Imported(note)) => {
            println!("{}", note.path);
            Ok(ExitCode::SUCCESS)
        }
        Ok(_) => Ok(ExitCode::SUCCESS),
        // Already reported through the notifier
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

/// Apply any given values to the saved settings, then print them.
async fn edit_settings(config: &Config, args: SettingsArgs) -> Result<ExitCode> {
    let saved = config.load_saved_settings().await?;
    let changed = args.hostname.is_some()
        || args.token.is_some()
        || [args.remove_yaml, args.add_link, args.inline_embeds, args.prepend_title]
            .iter()
            .any(Option::is_some);

    let mut settings = saved.with_overrides(args.hostname, args.token);
    settings.remove_yaml = args.remove_yaml.unwrap_or(settings.remove_yaml);
    settings.add_link = args.add_link.unwrap_or(settings.add_link);
    settings.inline_embeds = args.inline_embeds.unwrap_or(settings.inline_embeds);
    settings.prepend_title = args.prepend_title.unwrap_or(settings.prepend_title);

    if changed {
        settings.save(config.settings_path()).await?;
        eprintln!("Saved {}", config.settings_path().display());
    }
    println!("{:#?}", settings);
    Ok(ExitCode::SUCCESS)
}

/// Vault-relative note path from a path given on the command line.
fn note_path(vault: &Path, note: &str) -> String {
    let given = Path::new(note);
    let relative = given
        .strip_prefix(vault)
        .ok()
        .and_then(|p| p.to_str())
        .unwrap_or(note);
    ensure_markdown_extension(&normalize_path(relative))
}
