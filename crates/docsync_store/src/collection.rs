//! Named collections.

use crate::change_feed::{ChangeFeed, LocalChange, LocalChangeKind, RemoteApplied};
use crate::document::{now_millis, Document, Timestamp};
use crate::error::StoreResult;
use crate::memory::MemoryStore;
use crate::query::{Query, UpdateOptions};
use crate::store::DocumentStore;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// A named collection: a document store plus its change feed.
///
/// Application code writes through [`Collection::insert`],
/// [`Collection::save`] and [`Collection::remove`]. These stamp
/// timestamps and publish on the local channel. The sync engine writes
/// through [`Collection::store`] directly and announces its writes with
/// [`Collection::notify_remote_applied`].
pub struct Collection {
    name: String,
    path: Option<PathBuf>,
    store: Arc<dyn DocumentStore>,
    feed: ChangeFeed,
    write_lock: Mutex<()>,
}

impl Collection {
    /// Wraps an existing store.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        path: Option<PathBuf>,
        feed_capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            path,
            store,
            feed: ChangeFeed::new(feed_capacity),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates an empty collection backed by a [`MemoryStore`].
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(MemoryStore::new()), None, 1024)
    }

    /// Returns the collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the on-disk log path, if the collection is persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Returns the change feed.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Subscribes to application writes.
    pub fn subscribe_local(&self) -> broadcast::Receiver<LocalChange> {
        self.feed.subscribe_local()
    }

    /// Subscribes to remote-applied notices.
    pub fn subscribe_remote(&self) -> broadcast::Receiver<RemoteApplied> {
        self.feed.subscribe_remote()
    }

    /// Finds documents.
    pub fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        self.store.find(query)
    }

    /// Fetches one document.
    pub fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        self.store.get(id)
    }

    /// Number of documents.
    pub fn len(&self) -> StoreResult<usize> {
        self.store.len()
    }

    /// Returns true if the collection is empty.
    pub fn is_empty(&self) -> StoreResult<bool> {
        self.store.is_empty()
    }

    /// Inserts a new document with a generated id.
    pub fn insert(&self, body: Map<String, Value>) -> StoreResult<Document> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.save(Document::new(id, body))
    }

    /// Inserts or replaces a document.
    ///
    /// `_mtime` is stamped as `max(now, previous + 1)`, so it never goes
    /// backwards even if the wall clock does. `_ctime` is kept from the
    /// stored version, or set to the stamp on first insert.
    pub fn save(&self, mut doc: Document) -> StoreResult<Document> {
        let guard = self.write_lock.lock();

        let previous = self.store.get(&doc.id)?;
        let now = now_millis();
        let kind = match &previous {
            Some(prev) => {
                doc.ctime = prev.ctime;
                doc.mtime = next_mtime(now, prev.mtime);
                LocalChangeKind::Update
            }
            None => {
                doc.mtime = next_mtime(now, doc.mtime);
                if doc.ctime == 0 {
                    doc.ctime = doc.mtime;
                }
                LocalChangeKind::Insert
            }
        };

        self.store
            .update(&Query::id(&doc.id), doc.clone(), UpdateOptions::upsert())?;
        drop(guard);

        self.feed.emit_local(LocalChange {
            collection: self.name.clone(),
            ids: vec![doc.id.clone()],
            kind,
        });
        Ok(doc)
    }

    /// Removes a document, returning whether it existed.
    pub fn remove(&self, id: &str) -> StoreResult<bool> {
        let removed = {
            let _guard = self.write_lock.lock();
            self.store.remove(&Query::id(id))?
        };

        if removed > 0 {
            self.feed.emit_local(LocalChange {
                collection: self.name.clone(),
                ids: vec![id.to_string()],
                kind: LocalChangeKind::Remove,
            });
        }
        Ok(removed > 0)
    }

    /// Announces documents written by the sync engine.
    ///
    /// Only the remote channel fires; local subscribers see nothing.
    pub fn notify_remote_applied(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        self.feed.emit_remote(RemoteApplied {
            collection: self.name.clone(),
            ids,
        });
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn next_mtime(now: Timestamp, previous: Timestamp) -> Timestamp {
    now.max(previous.saturating_add(1))
}
