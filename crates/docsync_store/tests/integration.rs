//! Integration tests for the document store.

use docsync_store::{
    Document, DocumentStore, FileStore, MemoryStore, Query, Registry, StoreConfig, UpdateOptions,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use tempfile::tempdir;

#[derive(Debug, Clone)]
enum Op {
    Upsert(String, i64),
    Replace(String, i64),
    Remove(String),
    RemoveMany(Vec<String>),
}

fn id_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "c", "d", "e"]).prop_map(String::from)
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (id_strategy(), 1i64..1_000).prop_map(|(id, m)| Op::Upsert(id, m)),
        2 => (id_strategy(), 1i64..1_000).prop_map(|(id, m)| Op::Replace(id, m)),
        1 => id_strategy().prop_map(Op::Remove),
        1 => prop::collection::vec(id_strategy(), 0..3).prop_map(Op::RemoveMany),
    ]
}

fn doc(id: &str, mtime: i64) -> Document {
    let body: Map<String, Value> = json!({"rev": mtime, "nested": {"id": id}})
        .as_object()
        .cloned()
        .unwrap();
    Document::new(id, body).with_times(1, mtime)
}

fn apply(store: &dyn DocumentStore, op: &Op) -> usize {
    match op {
        Op::Upsert(id, m) => store
            .update(&Query::id(id), doc(id, *m), UpdateOptions::upsert())
            .unwrap(),
        Op::Replace(id, m) => store
            .update(&Query::id(id), doc(id, *m), UpdateOptions::default())
            .unwrap(),
        Op::Remove(id) => store.remove(&Query::id(id)).unwrap(),
        Op::RemoveMany(ids) => store.remove(&Query::ids(ids.clone())).unwrap(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn file_store_matches_memory_store_after_reopen(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes");
        let memory = MemoryStore::new();

        {
            let file = FileStore::open(&path, false).unwrap();
            for op in &ops {
                prop_assert_eq!(apply(&file, op), apply(&memory, op));
            }
        }

        let reopened = FileStore::open(&path, false).unwrap();
        prop_assert_eq!(reopened.find(&Query::All).unwrap(), memory.find(&Query::All).unwrap());

        reopened.compact().unwrap();
        drop(reopened);
        let compacted = FileStore::open(&path, false).unwrap();
        prop_assert_eq!(compacted.find(&Query::All).unwrap(), memory.find(&Query::All).unwrap());
        prop_assert_eq!(compacted.stats().records, compacted.stats().live);
    }
}

#[test]
fn collections_are_isolated_on_disk() {
    let temp = tempdir().unwrap();
    {
        let registry = Registry::open(temp.path(), StoreConfig::default()).unwrap();
        let notes = registry.collection("notes").unwrap();
        let tags = registry.collection("tags").unwrap();
        notes.save(doc("x", 5)).unwrap();
        tags.save(doc("x", 9)).unwrap();
        tags.save(doc("y", 9)).unwrap();
    }

    let registry = Registry::open(temp.path(), StoreConfig::default()).unwrap();
    assert_eq!(registry.collection("notes").unwrap().len().unwrap(), 1);
    assert_eq!(registry.collection("tags").unwrap().len().unwrap(), 2);
    assert_eq!(
        registry.data_dir().unwrap().collection_names().unwrap(),
        vec!["notes", "tags"]
    );
}

#[test]
fn find_by_ids_skips_missing_and_sorts() {
    let store = MemoryStore::new();
    for id in ["c", "a", "b"] {
        store
            .update(&Query::id(id), doc(id, 1), UpdateOptions::upsert())
            .unwrap();
    }

    let found = store.find(&Query::ids(["c", "zz", "a"])).unwrap();
    let ids: Vec<_> = found.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}
