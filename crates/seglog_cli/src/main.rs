//! Seglog CLI
//!
//! Command-line tools for seglog stores.
//!
//! # Commands
//!
//! - `get` / `set` / `incr` / `delete` - Single key-value operations
//! - `inspect` - Display store statistics
//! - `verify` - Verify store integrity
//! - `compact` - Rewrite the store to reclaim space
//! - `dump` - Dump commit records for debugging

mod commands;

use clap::{Parser, Subcommand};
use commands::kv::KvCommand;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Seglog command-line store tools.
#[derive(Parser)]
#[command(name = "seglog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the value stored under a key
    Get {
        /// Domain to read from
        domain: String,
        /// Key to read
        key: String,
        /// Decode the value as a counter
        #[arg(short, long)]
        counter: bool,
    },

    /// Store a value under a key
    Set {
        /// Domain to write to
        domain: String,
        /// Key to write
        key: String,
        /// Value to store
        value: String,
    },

    /// Increment a counter and print the new value
    Incr {
        /// Domain holding the counter
        domain: String,
        /// Counter key
        key: String,
    },

    /// Delete a key
    Delete {
        /// Domain to delete from
        domain: String,
        /// Key to delete
        key: String,
    },

    /// Display store statistics
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Verify store integrity
    Verify,

    /// Rewrite the store keeping only live keys
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Dump commit records for debugging
    Dump {
        /// Maximum number of records to dump
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.path.as_deref();
    let kv = match cli.command {
        Commands::Get {
            domain,
            key,
            counter,
        } => Some(KvCommand::Get {
            domain,
            key,
            counter,
        }),
        Commands::Set { domain, key, value } => Some(KvCommand::Set { domain, key, value }),
        Commands::Incr { domain, key } => Some(KvCommand::Incr { domain, key }),
        Commands::Delete { domain, key } => Some(KvCommand::Delete { domain, key }),
        Commands::Inspect { format } => {
            let path = path.ok_or("Store path required for inspect")?;
            commands::inspect::run(path, &format)?;
            None
        }
        Commands::Verify => {
            let path = path.ok_or("Store path required for verify")?;
            commands::verify::run(path)?;
            None
        }
        Commands::Compact { dry_run } => {
            let path = path.ok_or("Store path required for compact")?;
            commands::compact::run(path, dry_run)?;
            None
        }
        Commands::Dump { limit, format } => {
            let path = path.ok_or("Store path required for dump")?;
            commands::dump::run(path, limit, &format)?;
            None
        }
        Commands::Version => {
            println!("seglog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("seglog storage v{}", seglog_storage::VERSION);
            None
        }
    };

    if let Some(command) = kv {
        let path = path.ok_or("Store path required")?;
        commands::kv::run(path, &command)?;
    }

    Ok(())
}
