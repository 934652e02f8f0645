//! bitcask CLI
//!
//! Command-line tools for a bitcask key-value store.
//!
//! # Commands
//!
//! - `put` - Insert or overwrite a key
//! - `get` - Read a key's value
//! - `delete` - Remove a key
//! - `keys` - List every live key
//! - `merge` - Compact the log, reclaiming space from overwritten/deleted keys
//! - `stats` - Display database statistics

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command-line tools for a bitcask key-value store.
#[derive(Parser)]
#[command(name = "bitcask")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database directory.
    #[arg(global = true, short, long)]
    path: PathBuf,

    /// Enable verbose output.
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert or overwrite a key.
    Put {
        /// Key to write.
        key: String,
        /// Value to write.
        value: String,
    },

    /// Read a key's value.
    Get {
        /// Key to read.
        key: String,
    },

    /// Remove a key.
    Delete {
        /// Key to remove.
        key: String,
    },

    /// List every live key.
    Keys {
        /// Output format (text, json).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Compact the log, reclaiming space from overwritten and deleted keys.
    /// The compacted output only takes effect after the database is
    /// reopened.
    Merge,

    /// Display database statistics.
    Stats {
        /// Output format (text, json).
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Put { key, value } => commands::put::run(&cli.path, &key, &value)?,
        Commands::Get { key } => commands::get::run(&cli.path, &key)?,
        Commands::Delete { key } => commands::delete::run(&cli.path, &key)?,
        Commands::Keys { format } => commands::keys::run(&cli.path, &format)?,
        Commands::Merge => commands::merge::run(&cli.path)?,
        Commands::Stats { format } => commands::stats::run(&cli.path, &format)?,
    }

    Ok(())
}
