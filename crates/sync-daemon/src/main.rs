//! search-sync
//!
//! Keeps remote search indexes in sync with a content database.
//!
//! # Usage
//!
//! ```bash
//! search-sync start
//! search-sync reindex [--index NAME]
//! search-sync purge [--index NAME]
//! search-sync hook save --id N --type T [--update]
//! search-sync hook delete --id N [--type T]
//! search-sync status
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/search-sync/config.toml)
//! 3. Environment variables (SEARCHSYNC_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use sync_daemon::{
    handle_hook, init_logging, load_settings, run_purge, run_reindex, show_status, start_daemon,
    Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Start { db_path } => {
            let mut settings = settings;
            if let Some(db_path) = db_path {
                settings.db_path = db_path;
            }
            start_daemon(&settings).await?;
        }
        Commands::Reindex { index } => {
            run_reindex(&settings, index.as_deref()).await?;
        }
        Commands::Purge { index } => {
            run_purge(&settings, index.as_deref()).await?;
        }
        Commands::Hook(command) => {
            handle_hook(&settings, command)?;
        }
        Commands::Status => {
            show_status(&settings)?;
        }
    }

    Ok(())
}
