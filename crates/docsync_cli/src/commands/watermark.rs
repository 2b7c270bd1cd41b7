//! Watermark command implementation.
//!
//! Manual intervention for a collection whose watermark is wrong: `reset`
//! forces the next cycle to treat the collection as never synced.

use super::open_dir;
use docsync_store::Timestamp;
use docsync_sync_engine::{FileWatermarkStore, WatermarkStore};
use std::path::Path;

/// Prints the stored watermark of a collection.
pub fn show(path: &Path, collection: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value = load(path, collection)?;
    println!("{collection}: {value}");
    Ok(())
}

/// Overwrites the watermark of a collection.
pub fn set(
    path: &Path,
    collection: &str,
    value: Timestamp,
) -> Result<(), Box<dyn std::error::Error>> {
    if value < 0 {
        return Err("Watermark cannot be negative".into());
    }

    let dir = open_dir(path)?;
    let watermarks = FileWatermarkStore::for_data_dir(&dir);
    let previous = watermarks.load(collection);
    watermarks.save(collection, value)?;

    tracing::info!(collection, previous, value, "watermark updated");
    println!("{collection}: {previous} -> {value}");
    Ok(())
}

/// Reads the watermark of a collection (0 if unset).
pub fn load(path: &Path, collection: &str) -> Result<Timestamp, Box<dyn std::error::Error>> {
    let dir = open_dir(path)?;
    Ok(FileWatermarkStore::for_data_dir(&dir).load(collection))
}
