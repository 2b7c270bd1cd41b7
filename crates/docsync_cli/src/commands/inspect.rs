//! Inspect command implementation.

use super::open_dir;
use docsync_store::{FileStore, Timestamp};
use docsync_sync_engine::{FileWatermarkStore, WatermarkStore};
use serde::Serialize;
use std::path::Path;

/// Data directory inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory path.
    pub path: String,
    /// Total log size in bytes.
    pub total_size: u64,
    /// Per-collection statistics.
    pub collections: Vec<CollectionStats>,
}

/// Statistics for a single collection.
#[derive(Debug, Serialize)]
pub struct CollectionStats {
    /// Collection name.
    pub name: String,
    /// Live documents.
    pub documents: usize,
    /// Log records, superseded ones included.
    pub records: usize,
    /// Log size in bytes.
    pub bytes: u64,
    /// Last successful sync, epoch milliseconds (0 if never).
    pub watermark: Timestamp,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = collect(path)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => print_text_output(&result),
    }

    Ok(())
}

/// Gathers statistics for every collection in the directory.
pub fn collect(path: &Path) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let dir = open_dir(path)?;
    let watermarks = FileWatermarkStore::for_data_dir(&dir);

    let mut collections = Vec::new();
    for name in dir.collection_names()? {
        let stats = FileStore::open(&dir.collection_path(&name), false)?.stats();
        tracing::debug!(collection = %name, records = stats.records, "inspected collection");
        collections.push(CollectionStats {
            watermark: watermarks.load(&name),
            documents: stats.live,
            records: stats.records,
            bytes: stats.bytes,
            name,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        total_size: collections.iter().map(|c| c.bytes).sum(),
        collections,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("docsync Data Directory");
    println!("======================");
    println!();
    println!("Path:       {}", result.path);
    println!("Total size: {}", format_size(result.total_size));
    println!();

    if result.collections.is_empty() {
        println!("No collections.");
        return;
    }

    println!("Collections:");
    for col in &result.collections {
        println!(
            "  {}: {} documents, {} records, {}, last sync {}",
            col.name,
            col.documents,
            col.records,
            format_size(col.bytes),
            if col.watermark == 0 {
                "never".to_string()
            } else {
                col.watermark.to_string()
            }
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_store::{Registry, StoreConfig};
    use serde_json::Map;
    use tempfile::tempdir;

    #[test]
    fn reports_collections_and_watermarks() {
        let temp = tempdir().unwrap();
        {
            let registry = Registry::open(temp.path(), StoreConfig::default()).unwrap();
            let notes = registry.collection("notes").unwrap();
            let doc = notes.insert(Map::new()).unwrap();
            notes.save(doc).unwrap();
            registry.collection("tags").unwrap();

            FileWatermarkStore::for_data_dir(registry.data_dir().unwrap())
                .save("notes", 1234)
                .unwrap();
        }

        let result = collect(temp.path()).unwrap();
        let names: Vec<_> = result.collections.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["notes", "tags"]);

        let notes = &result.collections[0];
        assert_eq!((notes.documents, notes.records), (1, 2));
        assert_eq!(notes.watermark, 1234);
        assert_eq!(result.collections[1].watermark, 0);
        assert_eq!(result.total_size, notes.bytes);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let temp = tempdir().unwrap();
        assert!(collect(&temp.path().join("absent")).is_err());
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(12), "12 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
