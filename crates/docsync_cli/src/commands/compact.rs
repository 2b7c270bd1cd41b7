//! Compact command implementation.

use super::open_dir;
use docsync_store::{FileStore, LogStats};
use std::path::Path;

/// Compaction result for one collection.
#[derive(Debug)]
pub struct CompactStats {
    /// Collection name.
    pub name: String,
    /// Log statistics before compaction.
    pub before: LogStats,
    /// Log statistics after compaction (same as `before` on a dry run).
    pub after: LogStats,
}

/// Runs the compact command.
pub fn run(
    path: &Path,
    only: Option<&str>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting collections at {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let results = compact(path, only, dry_run)?;
    if results.is_empty() {
        println!("No collections found");
        return Ok(());
    }

    for stats in &results {
        let superseded = stats.before.records - stats.before.live;
        println!("{}:", stats.name);
        println!("  Records:    {} ({} superseded)", stats.before.records, superseded);
        println!("  Size before: {} bytes", stats.before.bytes);
        println!("  Size after:  {} bytes", stats.after.bytes);
    }

    Ok(())
}

/// Compacts the logs of `only`, or of every collection.
pub fn compact(
    path: &Path,
    only: Option<&str>,
    dry_run: bool,
) -> Result<Vec<CompactStats>, Box<dyn std::error::Error>> {
    let dir = open_dir(path)?;
    let names = match only {
        Some(name) => {
            if !dir.collection_path(name).is_file() {
                return Err(format!("No collection named {name}").into());
            }
            vec![name.to_string()]
        }
        None => dir.collection_names()?,
    };

    let mut results = Vec::with_capacity(names.len());
    for name in names {
        let store = FileStore::open(&dir.collection_path(&name), true)?;
        let before = store.stats();
        let after = if dry_run || before.records == before.live {
            before
        } else {
            store.compact()?
        };
        tracing::debug!(collection = %name, before = before.bytes, after = after.bytes, "compacted");
        results.push(CompactStats {
            name,
            before,
            after,
        });
    }
    Ok(results)
}
