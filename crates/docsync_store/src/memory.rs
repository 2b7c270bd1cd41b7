//! In-memory document store.

use crate::document::Document;
use crate::error::StoreResult;
use crate::query::{Query, UpdateOptions};
use crate::store::{check_update_target, DocumentStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory document store.
///
/// Useful for tests and for collections that do not need to survive a
/// restart. All data is lost when the store is dropped.
///
/// # Example
///
/// ```rust
/// use docsync_store::{Document, DocumentStore, MemoryStore, Query, UpdateOptions};
///
/// let store = MemoryStore::new();
/// let doc = Document::new("a", Default::default()).with_mtime(100);
/// store.update(&Query::id("a"), doc, UpdateOptions::upsert()).unwrap();
/// assert_eq!(store.len().unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Document>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `docs`.
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let map = docs.into_iter().map(|d| (d.id.clone(), d)).collect();
        Self {
            docs: RwLock::new(map),
        }
    }
}

impl DocumentStore for MemoryStore {
    fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let docs = self.docs.read();
        let found = match query {
            Query::All => docs.values().cloned().collect(),
            Query::Id(id) => docs.get(id).cloned().into_iter().collect(),
            Query::Ids(_) => docs
                .values()
                .filter(|d| query.matches(&d.id))
                .cloned()
                .collect(),
        };
        Ok(found)
    }

    fn update(&self, query: &Query, doc: Document, options: UpdateOptions) -> StoreResult<usize> {
        check_update_target(query, &doc)?;

        let mut docs = self.docs.write();
        if docs.contains_key(&doc.id) || options.upsert {
            docs.insert(doc.id.clone(), doc);
            Ok(1)
        } else {
            Ok(0)
        }
    }

    fn remove(&self, query: &Query) -> StoreResult<usize> {
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|id, _| !query.matches(id));
        Ok(before - docs.len())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.docs.read().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use serde_json::json;

    fn doc(id: &str, mtime: i64) -> Document {
        Document::new(id, json!({"v": mtime}).as_object().cloned().unwrap()).with_mtime(mtime)
    }

    #[test]
    fn upsert_inserts_and_replaces() {
        let store = MemoryStore::new();

        assert_eq!(
            store
                .update(&Query::id("a"), doc("a", 1), UpdateOptions::upsert())
                .unwrap(),
            1
        );
        store
            .update(&Query::id("a"), doc("a", 2), UpdateOptions::upsert())
            .unwrap();

        let found = store.get("a").unwrap().unwrap();
        assert_eq!(found.mtime, 2);
        assert_eq!(found.body["v"], 2);
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn update_without_upsert_skips_missing() {
        let store = MemoryStore::new();
        let written = store
            .update(&Query::id("a"), doc("a", 1), UpdateOptions::default())
            .unwrap();
        assert_eq!(written, 0);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn update_rejects_mismatched_query() {
        let store = MemoryStore::new();
        let result = store.update(&Query::id("b"), doc("a", 1), UpdateOptions::upsert());
        assert!(matches!(result, Err(StoreError::InvalidUpdate(_))));
    }

    #[test]
    fn find_is_ordered_by_id() {
        let store = MemoryStore::with_documents([doc("c", 1), doc("a", 1), doc("b", 1)]);
        let ids: Vec<_> = store
            .find(&Query::All)
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let some = store.find(&Query::ids(["c", "a", "zz"])).unwrap();
        assert_eq!(some.len(), 2);
    }

    #[test]
    fn remove_by_query() {
        let store = MemoryStore::with_documents([doc("a", 1), doc("b", 1), doc("c", 1)]);
        assert_eq!(store.remove(&Query::ids(["a", "c"])).unwrap(), 2);
        assert_eq!(store.remove(&Query::id("a")).unwrap(), 0);
        assert_eq!(store.len().unwrap(), 1);
    }
}
