use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediarch")]
#[command(author, version, about = "Media library metadata enrichment engine")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the worker pool, schedulers, and garbage collector until signaled to stop
    Run,

    /// Manage libraries
    Library {
        #[command(subcommand)]
        action: LibraryAction,
    },

    /// Enqueue a file scan for a library immediately, bypassing its cadence
    Scan {
        /// Library id to scan
        library_id: String,
    },

    /// Enqueue a provider metadata update for a library immediately
    Update {
        /// Library id to update
        library_id: String,
    },

    /// Show job queue statistics
    Stats,

    /// Test connectivity to every configured metadata provider
    TestProviders,

    /// Test connectivity to every configured media player
    TestPlayers,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum LibraryAction {
    /// Register a new library
    Add {
        /// Display name
        name: String,
        /// Root directory to scan
        root_path: PathBuf,
        /// Media type: movie, tv, or music
        #[arg(long, default_value = "movie")]
        media_type: String,
    },
    /// List registered libraries
    List,
    /// Remove a library
    Remove {
        library_id: String,
    },
}
