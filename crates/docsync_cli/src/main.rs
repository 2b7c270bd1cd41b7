//! docsync CLI
//!
//! Maintenance tools for a docsync data directory. The directory must not be
//! open in another process; every command takes the directory lock.
//!
//! # Commands
//!
//! - `inspect` - Show collections, log sizes and sync watermarks
//! - `watermark` - Show, set or reset a collection's sync watermark
//! - `compact` - Rewrite collection logs without superseded records

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docsync command-line tools.
#[derive(Parser)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
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
    /// Show collections, log sizes and sync watermarks
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage the last-sync watermark of a collection
    Watermark {
        #[command(subcommand)]
        action: WatermarkAction,
    },

    /// Rewrite collection logs, dropping superseded records
    Compact {
        /// Only this collection (default: all)
        #[arg(short, long)]
        collection: Option<String>,

        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum WatermarkAction {
    /// Print the stored watermark
    Show {
        /// Collection name
        collection: String,
    },
    /// Overwrite the watermark with an epoch-millisecond value
    Set {
        /// Collection name
        collection: String,
        /// Epoch milliseconds
        value: i64,
    },
    /// Reset the watermark to 0, forcing a full reconciliation
    Reset {
        /// Collection name
        collection: String,
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
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Data directory path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Watermark { action } => {
            let path = cli.path.ok_or("Data directory path required for watermark")?;
            match action {
                WatermarkAction::Show { collection } => {
                    commands::watermark::show(&path, &collection)?;
                }
                WatermarkAction::Set { collection, value } => {
                    commands::watermark::set(&path, &collection, value)?;
                }
                WatermarkAction::Reset { collection } => {
                    commands::watermark::set(&path, &collection, 0)?;
                }
            }
        }
        Commands::Compact {
            collection,
            dry_run,
        } => {
            let path = cli.path.ok_or("Data directory path required for compact")?;
            commands::compact::run(&path, collection.as_deref(), dry_run)?;
        }
        Commands::Version => {
            println!("docsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
