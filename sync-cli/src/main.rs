//! # snapsync
//!
//! Command-line host for snapsync. Keeps the local application state and
//! the sync settings in a data directory and runs pull-merge-push cycles
//! against a WebDAV or Upstash remote.
//!
//! ## Commands
//!
//! - `init`: Write sync settings
//! - `check`: Check that the remote is reachable
//! - `sync`: Run one sync cycle
//! - `watch`: Sync on an interval until Ctrl-C
//! - `export`: Write local state to a backup file
//! - `import`: Merge a backup file into local state
//! - `status`: Show sync status
//!
//! ## Example
//!
//! ```bash
//! # Configure a WebDAV remote (prompts for the password)
//! snapsync init --endpoint https://dav.example.com/remote.php/dav --username alice
//!
//! # Verify and sync
//! snapsync check
//! snapsync sync
//!
//! # Keep syncing every 5 minutes
//! snapsync watch
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;

use commands::{check, export, import, init, status, sync, watch};

/// Offline-first state sync against a WebDAV or Upstash remote.
#[derive(Parser, Debug)]
#[command(name = "snapsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for settings and local state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write sync settings
    Init(init::InitArgs),

    /// Check that the remote is reachable
    Check,

    /// Run one sync cycle
    Sync,

    /// Sync on an interval until Ctrl-C
    Watch {
        /// Seconds between cycles (defaults to the configured interval)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Write local state to a backup file
    Export {
        /// Output directory (defaults to <data-dir>/backups)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Merge a backup file into local state
    Import {
        /// Backup file to merge
        file: PathBuf,
    },

    /// Show sync status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;
    config::set_dir_permissions_0700(&data_dir).await?;

    match cli.command {
        Commands::Init(args) => {
            init::run(&data_dir, &args).await?;
        }
        Commands::Check => {
            check::run(&data_dir).await?;
        }
        Commands::Sync => {
            sync::run(&data_dir).await?;
        }
        Commands::Watch { interval } => {
            watch::run(&data_dir, interval).await?;
        }
        Commands::Export { out } => {
            export::run(&data_dir, out.as_deref()).await?;
        }
        Commands::Import { file } => {
            import::run(&data_dir, &file).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so command output stays clean on stdout.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Get the default data directory for snapsync.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "snapsync", "snapsync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
