//! Server-side document storage.

use docsync_protocol::{Change, MetaEntry};
use docsync_store::{now_millis, Document, Timestamp};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
enum Entry {
    Live(Document),
    Deleted { at: Timestamp, reported: bool },
}

impl Entry {
    fn mtime(&self) -> Timestamp {
        match self {
            Entry::Live(doc) => doc.mtime,
            Entry::Deleted { at, .. } => *at,
        }
    }
}

/// Documents per collection, with tombstones for deletions.
///
/// Writes are last-write-by-timestamp: an upsert older than what is stored
/// is ignored. Tombstones are kept so an old upsert cannot resurrect a
/// deleted document, but they never appear in listings or get responses.
#[derive(Debug, Default)]
pub struct Datastore {
    collections: RwLock<HashMap<String, BTreeMap<String, Entry>>>,
}

impl Datastore {
    /// Creates an empty datastore.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists `(id, mtime)` of live documents, ordered by id.
    pub fn list_meta(&self, collection: &str) -> Vec<MetaEntry> {
        let collections = self.collections.read();
        let Some(entries) = collections.get(collection) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|(id, entry)| match entry {
                Entry::Live(doc) => Some(MetaEntry::new(id.clone(), doc.mtime)),
                Entry::Deleted { .. } => None,
            })
            .collect()
    }

    /// Applies a batch of changes, returning how many took effect.
    pub fn apply(&self, collection: &str, changes: Vec<Change>) -> u64 {
        let mut collections = self.collections.write();
        let entries = collections.entry(collection.to_string()).or_default();
        let mut accepted = 0;

        for change in changes {
            match change {
                Change::Upsert(doc) => {
                    match entries.get_mut(&doc.id) {
                        Some(Entry::Deleted { at, reported }) if *at > doc.mtime => {
                            // Clients without tombstone support keep sending
                            // their old copy; say so once per tombstone.
                            if !*reported {
                                tracing::info!(collection, id = %doc.id, "upsert blocked by tombstone");
                                *reported = true;
                            }
                            continue;
                        }
                        Some(existing) if existing.mtime() > doc.mtime => {
                            tracing::debug!(collection, id = %doc.id, "ignoring stale upsert");
                            continue;
                        }
                        _ => {}
                    }
                    entries.insert(doc.id.clone(), Entry::Live(doc));
                }
                Change::Delete(id) => {
                    let at = match entries.get(&id) {
                        Some(existing) => now_millis().max(existing.mtime()),
                        None => now_millis(),
                    };
                    entries.insert(
                        id,
                        Entry::Deleted {
                            at,
                            reported: false,
                        },
                    );
                }
            }
            accepted += 1;
        }
        accepted
    }

    /// Returns the live documents among `ids`, in request order.
    pub fn get(&self, collection: &str, ids: &[String]) -> Vec<Document> {
        let collections = self.collections.read();
        let Some(entries) = collections.get(collection) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| match entries.get(id) {
                Some(Entry::Live(doc)) => Some(doc.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns one live document.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        match self.collections.read().get(collection)?.get(id)? {
            Entry::Live(doc) => Some(doc.clone()),
            Entry::Deleted { .. } => None,
        }
    }

    /// Number of live documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|entries| {
                entries
                    .values()
                    .filter(|e| matches!(e, Entry::Live(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Returns true if a collection holds no live documents.
    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Number of tombstones in a collection.
    pub fn tombstones(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|entries| {
                entries
                    .values()
                    .filter(|e| matches!(e, Entry::Deleted { .. }))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn doc(id: &str, mtime: Timestamp) -> Document {
        Document::new(id, Map::new()).with_times(1, mtime)
    }

    #[test]
    fn upsert_and_list() {
        let store = Datastore::new();
        assert_eq!(store.apply("notes", vec![Change::Upsert(doc("b", 2)), Change::Upsert(doc("a", 1))]), 2);
        assert_eq!(
            store.list_meta("notes"),
            vec![MetaEntry::new("a", 1), MetaEntry::new("b", 2)]
        );
        assert!(store.list_meta("other").is_empty());
    }

    #[test]
    fn stale_upsert_is_ignored() {
        let store = Datastore::new();
        store.apply("notes", vec![Change::Upsert(doc("a", 10))]);
        assert_eq!(store.apply("notes", vec![Change::Upsert(doc("a", 5))]), 0);
        assert_eq!(store.document("notes", "a").unwrap().mtime, 10);

        assert_eq!(store.apply("notes", vec![Change::Upsert(doc("a", 10))]), 1);
    }

    #[test]
    fn tombstones_hide_documents() {
        let store = Datastore::new();
        store.apply("notes", vec![Change::Upsert(doc("a", 10))]);
        store.apply("notes", vec![Change::delete("a")]);

        assert!(store.list_meta("notes").is_empty());
        assert!(store.get("notes", &["a".into()]).is_empty());
        assert!(store.is_empty("notes"));
        assert_eq!(store.tombstones("notes"), 1);

        // An upsert from before the delete does not resurrect it.
        assert_eq!(store.apply("notes", vec![Change::Upsert(doc("a", 11))]), 0);
        assert!(store.document("notes", "a").is_none());
    }

    #[test]
    fn repeated_upserts_against_tombstone_count_nothing() {
        let store = Datastore::new();
        store.apply("notes", vec![Change::Upsert(doc("a", 10))]);
        store.apply("notes", vec![Change::delete("a")]);

        for _ in 0..3 {
            let accepted = store.apply(
                "notes",
                vec![Change::Upsert(doc("a", 10)), Change::Upsert(doc("b", 1))],
            );
            assert_eq!(accepted, 1);
        }
        assert!(matches!(
            store.collections.read()["notes"]["a"],
            Entry::Deleted { reported: true, .. }
        ));
        assert_eq!(store.len("notes"), 1);
    }

    #[test]
    fn get_skips_unknown_ids() {
        let store = Datastore::new();
        store.apply("notes", vec![Change::Upsert(doc("a", 1))]);
        let got = store.get("notes", &["x".into(), "a".into()]);
        assert_eq!(got, vec![doc("a", 1)]);
    }
}
