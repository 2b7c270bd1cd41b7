//! Remote datastore API abstraction.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use docsync_protocol::{
    Change, GetRequest, GetResponse, ListMetaRequest, ListMetaResponse, MetaEntry, PutRequest,
    PutResponse,
};
use docsync_store::Document;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// The three remote operations the engine consumes, plus a session check.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-process loopback, mock for testing).
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Returns true if a user session is established.
    fn is_authenticated(&self) -> bool;

    /// Lists `(id, mtime)` for every document of a remote collection.
    async fn list_meta(&self, request: &ListMetaRequest) -> SyncResult<ListMetaResponse>;

    /// Sends a batch of changes.
    async fn put(&self, request: &PutRequest) -> SyncResult<PutResponse>;

    /// Fetches full documents by id.
    async fn get(&self, request: &GetRequest) -> SyncResult<GetResponse>;
}

/// Identifies one remote operation, for scripting [`MockRemote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    /// `list_meta`.
    ListMeta,
    /// `put`.
    Put,
    /// `get`.
    Get,
}

/// An in-memory remote for testing.
///
/// Holds documents per collection, counts calls, and can be scripted to
/// fail, stall, or return documents nobody asked for.
#[derive(Debug)]
pub struct MockRemote {
    authenticated: AtomicBool,
    collections: Mutex<HashMap<String, BTreeMap<String, Document>>>,
    failures: Mutex<HashMap<RemoteOp, VecDeque<SyncError>>>,
    latency: Mutex<Option<Duration>>,
    injected: Mutex<Vec<Document>>,
    last_put: Mutex<Option<PutRequest>>,
    calls: [AtomicUsize; 3],
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    /// Creates an authenticated, empty remote.
    pub fn new() -> Self {
        Self {
            authenticated: AtomicBool::new(true),
            collections: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            latency: Mutex::new(None),
            injected: Mutex::new(Vec::new()),
            last_put: Mutex::new(None),
            calls: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sets the session state.
    pub fn set_authenticated(&self, authenticated: bool) {
        self.authenticated.store(authenticated, Ordering::SeqCst);
    }

    /// Stores a document as if another client had pushed it.
    pub fn insert(&self, collection: &str, doc: Document) {
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .insert(doc.id.clone(), doc);
    }

    /// Returns a stored document.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .lock()
            .get(collection)
            .and_then(|docs| docs.get(id).cloned())
    }

    /// Returns every stored document of a collection, ordered by id.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: RemoteOp, err: SyncError) {
        self.failures.lock().entry(op).or_default().push_back(err);
    }

    /// Delays every `list_meta` call.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Appends documents to every `get` response, requested or not.
    pub fn inject_get_documents(&self, docs: Vec<Document>) {
        *self.injected.lock() = docs;
    }

    /// Number of calls made to `op`.
    pub fn calls(&self, op: RemoteOp) -> usize {
        self.calls[op as usize].load(Ordering::SeqCst)
    }

    /// Highest number of `list_meta` calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Returns the most recent put request.
    pub fn last_put(&self) -> Option<PutRequest> {
        self.last_put.lock().clone()
    }

    fn begin(&self, op: RemoteOp) -> SyncResult<()> {
        self.calls[op as usize].fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn list_meta(&self, request: &ListMetaRequest) -> SyncResult<ListMetaResponse> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        self.begin(RemoteOp::ListMeta)?;
        let entries = self
            .documents(&request.collection)
            .into_iter()
            .map(|doc| MetaEntry::new(doc.id, doc.mtime))
            .collect();
        Ok(ListMetaResponse::new(entries))
    }

    async fn put(&self, request: &PutRequest) -> SyncResult<PutResponse> {
        self.begin(RemoteOp::Put)?;
        *self.last_put.lock() = Some(request.clone());

        let mut collections = self.collections.lock();
        let docs = collections.entry(request.collection.clone()).or_default();
        for change in &request.changes {
            match change {
                Change::Upsert(doc) => {
                    docs.insert(doc.id.clone(), doc.clone());
                }
                Change::Delete(id) => {
                    docs.remove(id);
                }
            }
        }
        Ok(PutResponse::new(request.changes.len() as u64))
    }

    async fn get(&self, request: &GetRequest) -> SyncResult<GetResponse> {
        self.begin(RemoteOp::Get)?;

        let mut documents: Vec<Document> = {
            let collections = self.collections.lock();
            match collections.get(&request.collection) {
                Some(docs) => request
                    .ids
                    .iter()
                    .filter_map(|id| docs.get(id).cloned())
                    .collect(),
                None => Vec::new(),
            }
        };
        documents.extend(self.injected.lock().iter().cloned());
        Ok(GetResponse::new(documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn doc(id: &str, mtime: i64) -> Document {
        Document::new(id, Map::new()).with_times(mtime, mtime)
    }

    #[tokio::test]
    async fn mock_roundtrip() {
        let remote = MockRemote::new();
        remote.insert("notes", doc("a", 10));

        let meta = remote.list_meta(&ListMetaRequest::new("notes")).await.unwrap();
        assert_eq!(meta.entries, vec![MetaEntry::new("a", 10)]);

        let put = PutRequest::new("notes", vec![Change::Upsert(doc("b", 20)), Change::delete("a")]);
        assert_eq!(remote.put(&put).await.unwrap().accepted, 2);

        let got = remote
            .get(&GetRequest::new("notes", vec!["a".into(), "b".into()]))
            .await
            .unwrap();
        assert_eq!(got.documents, vec![doc("b", 20)]);
        assert_eq!(remote.calls(RemoteOp::ListMeta), 1);
        assert_eq!(remote.calls(RemoteOp::Put), 1);
        assert_eq!(remote.calls(RemoteOp::Get), 1);
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let remote = MockRemote::new();
        remote.fail_next(RemoteOp::Put, SyncError::transport_retryable("offline"));

        let put = PutRequest::new("notes", vec![]);
        assert!(remote.put(&put).await.is_err());
        assert!(remote.put(&put).await.is_ok());
    }

    #[test]
    fn authentication_toggle() {
        let remote = MockRemote::new();
        assert!(remote.is_authenticated());
        remote.set_authenticated(false);
        assert!(!remote.is_authenticated());
    }
}
