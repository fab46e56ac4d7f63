//! macrolens-scan - Food photo scanner
//!
//! Sends a food photo to a vision model, prints the macronutrient estimate,
//! and keeps a short history of past scans.
//!
//! ```bash
//! macrolens-scan key set sk-ant-...
//! macrolens-scan scan lunch.jpg
//! macrolens-scan history --limit 5
//! macrolens-scan history --clear
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use macrolens_common::config::{
    resolve_data_folder, DataFolderInitializer, InferenceMode, TomlConfig,
};
use macrolens_common::credential::{CredentialStore, CREDENTIAL_ENV_VAR};
use macrolens_common::db::{init_database, KeyValueStore, SqliteSettingsStore};
use macrolens_common::inference::{AnthropicClient, InferenceBackend, RelayClient};
use macrolens_common::HistoryStore;
use macrolens_scan::orchestrator::ScanState;
use macrolens_scan::{ingest_file, render, ScanError, ScanSession};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "macrolens-scan")]
#[command(about = "Estimate the macronutrients in a food photo")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to ~/.config/macrolens/config.toml)
    #[arg(long, global = true, env = "MACROLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder holding the local database (overrides MACROLENS_DATA_FOLDER)
    #[arg(long, global = true)]
    data_folder: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a food photo
    Scan {
        /// Image file
        image: PathBuf,

        /// Media type, e.g. image/jpeg (detected from the file when omitted)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Show or clear past scans
    History {
        /// Show at most this many entries
        #[arg(long)]
        limit: Option<usize>,

        /// Delete all past scans
        #[arg(long, conflicts_with = "limit")]
        clear: bool,
    },

    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Store an API key
    Set {
        key: String,
    },
    /// Show the stored key (masked)
    Show,
    /// Delete the stored key
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = TomlConfig::load(cli.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "macrolens-scan v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let data_folder = resolve_data_folder(cli.data_folder.as_deref(), &config);
    let initializer = DataFolderInitializer::new(data_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize data folder")?;

    let db_path = initializer.database_path();
    debug!("Database: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open {}", db_path.display()))?;
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteSettingsStore::new(pool.clone()));

    let succeeded = match cli.command {
        Command::Scan { image, mime } => run_scan(&config, store, &image, mime.as_deref()).await?,
        Command::History { limit, clear } => {
            run_history(&config, store, limit, clear).await;
            true
        }
        Command::Key { action } => run_key(store, action).await?,
    };

    pool.close().await;
    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_backend(config: &TomlConfig) -> Result<Arc<dyn InferenceBackend>> {
    let backend: Arc<dyn InferenceBackend> = match config.mode {
        InferenceMode::Direct => {
            let client = AnthropicClient::from_config(config)
                .context("Failed to create inference client")?;
            info!(model = %client.model(), "Direct mode");
            Arc::new(client)
        }
        InferenceMode::Relay => {
            let client =
                RelayClient::from_config(config).context("Failed to create relay client")?;
            info!(relay = %client.relay_url(), "Relay mode");
            Arc::new(client)
        }
    };
    Ok(backend)
}

async fn run_scan(
    config: &TomlConfig,
    store: Arc<dyn KeyValueStore>,
    path: &Path,
    mime: Option<&str>,
) -> Result<bool> {
    let backend = build_backend(config)?;
    let credential = if backend.requires_credential() {
        CredentialStore::new(Arc::clone(&store)).resolve().await
    } else {
        None
    };
    let history = HistoryStore::load(store, config.history_capacity).await;
    let mut session = ScanSession::new(backend, credential, history);

    if let Some(image) = ingest_file(path, mime)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?
    {
        session.accept_image(image);
    }

    let interactive = std::io::stdin().is_terminal();
    loop {
        if let Err(refusal) = session.analyze().await {
            eprintln!("{}", refusal.user_message());
            if refusal == ScanError::NoCredential {
                eprintln!("Run `macrolens-scan key set <KEY>` or set {}.", CREDENTIAL_ENV_VAR);
            }
            return Ok(false);
        }

        match session.state() {
            ScanState::Succeeded { record, .. } => {
                print!("{}", render::render_record(record));
                return Ok(true);
            }
            ScanState::Failed { error, .. } => {
                eprintln!("{}", error.user_message());
                if !interactive || !confirm("Retry with the same photo? [y/N] ")? {
                    return Ok(false);
                }
                session.acknowledge();
            }
            other => {
                debug!(state = other.name(), "Scan ended without an outcome");
                return Ok(false);
            }
        }
    }
}

async fn run_history(
    config: &TomlConfig,
    store: Arc<dyn KeyValueStore>,
    limit: Option<usize>,
    clear: bool,
) {
    let mut history = HistoryStore::load(store, config.history_capacity).await;

    if clear {
        history.clear().await;
        println!("History cleared.");
        return;
    }

    let entries = history.entries();
    let shown = limit.unwrap_or(entries.len()).min(entries.len());
    print!("{}", render::render_history(&entries[..shown]));
}

async fn run_key(store: Arc<dyn KeyValueStore>, action: KeyCommand) -> Result<bool> {
    let credentials = CredentialStore::new(store);

    match action {
        KeyCommand::Set { key } => match credentials.save(&key).await? {
            Some(saved) => {
                println!("API key saved ({}).", saved.masked());
                if !saved.looks_well_formed() {
                    eprintln!("Warning: Anthropic API keys start with \"sk-ant-\".");
                }
                Ok(true)
            }
            None => {
                eprintln!("Empty key ignored.");
                Ok(false)
            }
        },
        KeyCommand::Show => {
            match credentials.load().await? {
                Some(key) => println!("{}", key.masked()),
                None if std::env::var_os(CREDENTIAL_ENV_VAR).is_some() => {
                    println!("No stored key; {} is set.", CREDENTIAL_ENV_VAR)
                }
                None => println!("No API key stored."),
            }
            Ok(true)
        }
        KeyCommand::Clear => {
            credentials.clear().await?;
            println!("API key removed.");
            Ok(true)
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{}", prompt);
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
