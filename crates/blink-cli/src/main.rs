//! Blink CLI
//!
//! Command-line interface for Blink - read and starred state synced across
//! devices through a GitHub Gist.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use blink_core::{Config, StorageError, SyncEngine, SyncError, SyncEvent};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "blink")]
#[command(about = "Blink - read and starred state synced across devices")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show replica and sync status
    Status,
    /// Mark items as seen
    Seen {
        /// Item IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Star an item
    Star {
        /// Item ID
        id: String,
        /// Title to cache with the star
        #[arg(short = 'T', long)]
        title: Option<String>,
        /// URL to cache with the star
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Unstar an item
    Unstar {
        /// Item ID
        id: String,
    },
    /// Flip the star on an item
    Toggle {
        /// Item ID
        id: String,
    },
    /// List starred items
    #[command(alias = "ls")]
    Starred,
    /// Fetch the remote document and merge it
    Pull,
    /// Publish local changes now
    Push,
    /// Pull, then push
    Sync,
    /// Clear the local replica
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (gist_id, github_token, retention_days, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

impl Commands {
    /// Commands that change the local replica
    fn is_write(&self) -> bool {
        matches!(
            self,
            Commands::Seen { .. }
                | Commands::Star { .. }
                | Commands::Unstar { .. }
                | Commands::Toggle { .. }
        )
    }

    /// Commands that talk to the remote themselves
    fn is_manual_sync(&self) -> bool {
        matches!(
            self,
            Commands::Pull | Commands::Push | Commands::Sync | Commands::Reset { .. }
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match execute(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(hint) = recovery_hint(&e) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli, output: &Output) -> Result<()> {
    // Config commands don't need the replica
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), output);
    }

    let config = Config::load().context("Failed to load configuration")?;
    debug!("Using replica at {:?}", config.sqlite_path());
    let engine = SyncEngine::from_config(&config)?;
    let mut events = engine.subscribe_events();

    // Pull before anything else so local edits merge onto the latest remote
    if !cli.command.is_manual_sync() {
        engine.sync_on_startup().await;
        report_failures(&mut events, output, "Auto-sync failed");
    }

    let is_write = cli.command.is_write();
    let result = run(cli.command, &engine, &config, output).await;

    // Flush the debounced push before exiting
    if is_write && result.is_ok() && engine.is_configured() && !engine.upload().await {
        output.warning("Changes saved locally but not pushed; they will sync next time");
    }

    engine.shutdown().await;
    result
}

async fn run(command: Commands, engine: &SyncEngine, config: &Config, output: &Output) -> Result<()> {
    match command {
        Commands::Status => commands::status::show(engine, config, output).await,
        Commands::Seen { ids } => commands::items::seen(engine, ids, output).await,
        Commands::Star { id, title, url } => {
            commands::items::star(engine, id, title, url, output).await
        }
        Commands::Unstar { id } => commands::items::unstar(engine, id, output).await,
        Commands::Toggle { id } => commands::items::toggle(engine, id, output).await,
        Commands::Starred => commands::items::starred(engine, output).await,
        Commands::Pull => commands::sync::pull(engine, output).await,
        Commands::Push => commands::sync::push(engine, output).await,
        Commands::Sync => commands::sync::sync(engine, output).await,
        Commands::Reset { yes } => commands::items::reset(engine, yes, output).await,
        Commands::Config { command } => handle_config_command(command, output),
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}

/// Print any error notices the engine queued so far
fn report_failures(
    events: &mut broadcast::Receiver<SyncEvent>,
    output: &Output,
    prefix: &str,
) {
    loop {
        match events.try_recv() {
            Ok(event) if !event.is_success() => {
                output.warning(&format!("{}: {}", prefix, event.message));
            }
            Ok(_) | Err(TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
}

/// First recovery suggestion found along the error's cause chain
fn recovery_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(e) = cause.downcast_ref::<SyncError>() {
            e.recovery_suggestion()
        } else {
            cause
                .downcast_ref::<StorageError>()
                .and_then(StorageError::recovery_suggestion)
        }
    })
}

/// Log to stderr, filtered by BLINK_LOG (default: warnings only)
fn init_logging() {
    let env_filter =
        EnvFilter::try_from_env("BLINK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
