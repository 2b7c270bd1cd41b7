//! Persisted "last successful sync" instants.
//!
//! One record per collection, stored next to the collection log as
//! `<collection>.sync`:
//!
//! ```text
//! CBOR { "collection": <name>, "lastSync": <epoch-ms> }
//! ```
//!
//! A missing or unreadable record loads as 0, which at worst costs one
//! extra full reconciliation.

use crate::error::{SyncError, SyncResult};
use docsync_store::{sync_directory, sync_path_for, DataDir, Timestamp};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Persists one watermark per collection.
pub trait WatermarkStore: Send + Sync {
    /// Returns the stored watermark, or 0 if none can be read.
    fn load(&self, collection: &str) -> Timestamp;

    /// Overwrites the stored watermark.
    ///
    /// This does not enforce monotonicity; the engine only ever calls
    /// [`WatermarkStore::advance`].
    fn save(&self, collection: &str, value: Timestamp) -> SyncResult<()>;

    /// Moves the watermark to `max(current, now)` and returns the result.
    fn advance(&self, collection: &str, now: Timestamp) -> SyncResult<Timestamp> {
        let current = self.load(collection);
        if now <= current {
            return Ok(current);
        }
        self.save(collection, now)?;
        Ok(now)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkRecord {
    collection: String,
    #[serde(rename = "lastSync")]
    last_sync: Timestamp,
}

/// Watermarks stored as files in a collection directory.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    dir: PathBuf,
}

impl FileWatermarkStore {
    /// Stores records in `dir`, next to the collection logs.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Stores records in the collection directory of `data_dir`.
    pub fn for_data_dir(data_dir: &DataDir) -> Self {
        Self::new(data_dir.db_dir())
    }

    /// Returns the record path for a collection.
    pub fn path_for(&self, collection: &str) -> PathBuf {
        sync_path_for(&self.dir.join(collection))
    }

    fn read(path: &Path) -> Option<Timestamp> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "cannot read watermark");
                return None;
            }
        };

        match ciborium::de::from_reader::<WatermarkRecord, _>(&bytes[..]) {
            Ok(record) => Some(record.last_sync),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt watermark, treating as 0");
                None
            }
        }
    }
}

impl WatermarkStore for FileWatermarkStore {
    fn load(&self, collection: &str) -> Timestamp {
        Self::read(&self.path_for(collection)).unwrap_or(0)
    }

    fn save(&self, collection: &str, value: Timestamp) -> SyncResult<()> {
        let path = self.path_for(collection);
        let record = WatermarkRecord {
            collection: collection.to_string(),
            last_sync: value,
        };

        let mut buf = Vec::new();
        ciborium::ser::into_writer(&record, &mut buf)
            .map_err(|e| SyncError::Store(format!("cannot encode watermark: {e}")))?;

        let mut temp_path = path.as_os_str().to_owned();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let io = |e: std::io::Error| SyncError::Store(format!("cannot write watermark: {e}"));

        let mut temp = File::create(&temp_path).map_err(io)?;
        temp.write_all(&buf).map_err(io)?;
        temp.sync_all().map_err(io)?;
        drop(temp);

        fs::rename(&temp_path, &path).map_err(io)?;
        sync_directory(&self.dir)?;
        Ok(())
    }
}

/// Watermarks kept in memory.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    values: Mutex<HashMap<String, Timestamp>>,
}

impl MemoryWatermarkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self, collection: &str) -> Timestamp {
        self.values.lock().get(collection).copied().unwrap_or(0)
    }

    fn save(&self, collection: &str, value: Timestamp) -> SyncResult<()> {
        self.values.lock().insert(collection.to_string(), value);
        Ok(())
    }
}
