//! Data directory management.
//!
//! This module handles the file system layout:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK                 # Advisory lock for single-process access
//! └─ db/
//!    ├─ <collection>      # Append-only document log
//!    └─ <collection>.sync # Sync watermark record
//! ```

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DB_DIR: &str = "db";

/// Suffix of the sync watermark record stored next to a collection's log.
pub const SYNC_SUFFIX: &str = ".sync";

/// An opened data directory.
///
/// Holds an exclusive advisory lock for as long as it lives, so only one
/// process can own the collections inside.
#[derive(Debug)]
pub struct DataDir {
    path: PathBuf,
    _lock_file: File,
}

impl DataDir {
    /// Opens or creates a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::MissingDirectory(path.to_path_buf()));
            }
        }

        fs::create_dir_all(path.join(DB_DIR))?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the data directory root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the directory holding collection files.
    #[must_use]
    pub fn db_dir(&self) -> PathBuf {
        self.path.join(DB_DIR)
    }

    /// Returns the log path for a collection.
    #[must_use]
    pub fn collection_path(&self, name: &str) -> PathBuf {
        self.db_dir().join(name)
    }

    /// Lists collections that have a log on disk.
    pub fn collection_names(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.db_dir())? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if validate_name(&name).is_ok() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Returns the sync record path that belongs to a collection log.
#[must_use]
pub fn sync_path_for(collection_path: &Path) -> PathBuf {
    let mut name = collection_path.as_os_str().to_owned();
    name.push(SYNC_SUFFIX);
    PathBuf::from(name)
}

/// Checks that a collection name can be used as a file name.
pub(crate) fn validate_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && !name.ends_with(SYNC_SUFFIX)
        && !name.ends_with(".tmp")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));

    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Syncs a directory so renames and creations inside it are durable.
#[cfg(unix)]
pub fn sync_directory(path: &Path) -> StoreResult<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub fn sync_directory(_path: &Path) -> StoreResult<()> {
    // NTFS journals metadata; directory handles cannot be fsynced
    Ok(())
}
