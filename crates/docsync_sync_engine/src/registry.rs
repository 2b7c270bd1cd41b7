//! Engines for several collections.

use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::queue::CycleWaiter;
use crate::remote::RemoteApi;
use crate::watermark::{FileWatermarkStore, MemoryWatermarkStore, WatermarkStore};
use docsync_store::{Collection, Registry};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Owns one [`SyncEngine`] per registered collection.
///
/// Collections share a remote client and a watermark store. Create one at
/// startup next to the store [`Registry`] and shut it down before closing
/// the registry.
pub struct SyncRegistry {
    remote: Arc<dyn RemoteApi>,
    watermarks: Arc<dyn WatermarkStore>,
    config: SyncConfig,
    engines: Mutex<BTreeMap<String, Arc<SyncEngine>>>,
}

impl SyncRegistry {
    /// Creates an empty registry.
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        watermarks: Arc<dyn WatermarkStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            remote,
            watermarks,
            config,
            engines: Mutex::new(BTreeMap::new()),
        }
    }

    /// Creates a registry whose watermarks live next to the collections of
    /// `store`, or in memory if `store` is in-memory.
    pub fn for_store(store: &Registry, remote: Arc<dyn RemoteApi>, config: SyncConfig) -> Self {
        let watermarks: Arc<dyn WatermarkStore> = match store.data_dir() {
            Some(dir) => Arc::new(FileWatermarkStore::for_data_dir(dir)),
            None => Arc::new(MemoryWatermarkStore::new()),
        };
        Self::new(remote, watermarks, config)
    }

    /// Starts syncing `collection` with the registry's default config.
    ///
    /// Registering the same name twice returns the existing engine.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn register(&self, collection: Arc<Collection>) -> Arc<SyncEngine> {
        self.register_with(collection, self.config.clone())
    }

    /// Starts syncing `collection` with its own config.
    ///
    /// A collection that has never synced gets a watermark record of 0.
    pub fn register_with(&self, collection: Arc<Collection>, config: SyncConfig) -> Arc<SyncEngine> {
        let mut engines = self.engines.lock();
        if let Some(existing) = engines.get(collection.name()) {
            return Arc::clone(existing);
        }

        let name = collection.name().to_string();
        // First registration creates the record; an unreadable one is reset.
        if self.watermarks.load(&name) == 0 {
            if let Err(e) = self.watermarks.save(&name, 0) {
                tracing::warn!(collection = %name, error = %e, "cannot create watermark record");
            }
        }

        let engine = Arc::new(SyncEngine::start(
            collection,
            Arc::clone(&self.remote),
            Arc::clone(&self.watermarks),
            config,
        ));
        engines.insert(name, Arc::clone(&engine));
        engine
    }

    /// Returns the engine of a registered collection.
    pub fn engine(&self, name: &str) -> Option<Arc<SyncEngine>> {
        self.engines.lock().get(name).cloned()
    }

    /// Names of registered collections, sorted.
    pub fn names(&self) -> Vec<String> {
        self.engines.lock().keys().cloned().collect()
    }

    /// Triggers every registered collection.
    pub fn trigger_all(&self) -> Vec<(String, CycleWaiter)> {
        self.engines
            .lock()
            .iter()
            .map(|(name, engine)| (name.clone(), engine.trigger_sync()))
            .collect()
    }

    /// Shuts every engine down and forgets them.
    pub async fn shutdown(&self) {
        let engines = std::mem::take(&mut *self.engines.lock());
        for engine in engines.values() {
            engine.shutdown().await;
        }
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("collections", &self.names())
            .finish_non_exhaustive()
    }
}
