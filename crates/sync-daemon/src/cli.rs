//! CLI argument parsing for search-sync.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// search-sync
///
/// Keeps remote search indexes in sync with a content database.
#[derive(Parser, Debug)]
#[command(name = "search-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/search-sync/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the reindex and purge schedules until interrupted
    Start {
        /// Override tracking database path
        #[arg(long)]
        db_path: Option<String>,
    },

    /// Run one reindex pass now
    Reindex {
        /// Only this index (default: all registered indexes)
        #[arg(short, long)]
        index: Option<String>,
    },

    /// Run one purge pass now
    Purge {
        /// Only this index (default: all registered indexes)
        #[arg(short, long)]
        index: Option<String>,
    },

    /// Content mutation hooks
    #[command(subcommand)]
    Hook(HookCommands),

    /// Show tracking and deletion counts per index
    Status,
}

/// Hook subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HookCommands {
    /// An item was created or edited
    Save {
        /// Item id
        #[arg(long)]
        id: u64,

        /// Item type
        #[arg(long = "type")]
        item_type: String,

        /// The item existed before this save
        #[arg(long)]
        update: bool,
    },

    /// An item is being deleted
    Delete {
        /// Item id
        #[arg(long)]
        id: u64,

        /// Item type; looked up in the content database when omitted
        #[arg(long = "type")]
        item_type: Option<String>,
    },
}
