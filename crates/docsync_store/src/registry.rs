//! Collection registry.

use crate::collection::Collection;
use crate::config::StoreConfig;
use crate::dir::{validate_name, DataDir};
use crate::error::StoreResult;
use crate::file::FileStore;
use crate::memory::MemoryStore;
use crate::store::DocumentStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Owns the collections of one data directory.
///
/// The registry is created once at startup and passed to whatever needs
/// collections; there is no process-wide table. Dropping it (or calling
/// [`Registry::close`]) releases the directory lock.
///
/// # Example
///
/// ```rust
/// use docsync_store::Registry;
///
/// let registry = Registry::in_memory();
/// let notes = registry.collection("notes").unwrap();
/// assert!(std::sync::Arc::ptr_eq(&notes, &registry.collection("notes").unwrap()));
/// ```
#[derive(Debug)]
pub struct Registry {
    dir: Option<DataDir>,
    config: StoreConfig,
    collections: RwLock<BTreeMap<String, Arc<Collection>>>,
}

impl Registry {
    /// Opens a data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or is locked by
    /// another process.
    pub fn open(path: &Path, config: StoreConfig) -> StoreResult<Self> {
        let dir = DataDir::open(path, config.create_if_missing)?;
        tracing::debug!(path = %path.display(), "opened data directory");
        Ok(Self {
            dir: Some(dir),
            config,
            collections: RwLock::new(BTreeMap::new()),
        })
    }

    /// Creates a registry whose collections live only in memory.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            config: StoreConfig::default(),
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the data directory, if persistent.
    pub fn data_dir(&self) -> Option<&DataDir> {
        self.dir.as_ref()
    }

    /// Returns the named collection, opening it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid file name or the
    /// collection log cannot be opened.
    pub fn collection(&self, name: &str) -> StoreResult<Arc<Collection>> {
        if let Some(existing) = self.collections.read().get(name) {
            return Ok(Arc::clone(existing));
        }

        validate_name(name)?;

        let mut collections = self.collections.write();
        if let Some(existing) = collections.get(name) {
            return Ok(Arc::clone(existing));
        }

        let collection = match &self.dir {
            Some(dir) => {
                let path = dir.collection_path(name);
                let store: Arc<dyn DocumentStore> =
                    Arc::new(FileStore::open(&path, self.config.sync_on_write)?);
                Collection::new(name, store, Some(path), self.config.feed_capacity)
            }
            None => Collection::new(
                name,
                Arc::new(MemoryStore::new()),
                None,
                self.config.feed_capacity,
            ),
        };

        let collection = Arc::new(collection);
        collections.insert(name.to_string(), Arc::clone(&collection));
        Ok(collection)
    }

    /// Returns an already-opened collection.
    pub fn get(&self, name: &str) -> Option<Arc<Collection>> {
        self.collections.read().get(name).cloned()
    }

    /// Names of opened collections, sorted.
    pub fn names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Closes the registry, dropping its collections and the directory lock.
    ///
    /// Collections still referenced elsewhere stay usable until those
    /// references are dropped.
    pub fn close(self) {
        let count = self.collections.read().len();
        tracing::debug!(collections = count, "closing registry");
    }
}
