//! search-sync library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, reindex, purge, hook, status)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, HookCommands};
pub use commands::{
    handle_hook, init_logging, load_settings, run_purge, run_reindex, show_status, start_daemon,
};
