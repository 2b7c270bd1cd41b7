//! The reconciliation job.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::reconcile::{classify, local_index, remote_index, SyncPlan};
use crate::remote::RemoteApi;
use crate::state::{CycleOutcome, CycleReport, SkipReason, SyncPhase, SyncStats};
use crate::trigger::DirtyFlag;
use crate::watermark::WatermarkStore;
use docsync_protocol::{GetRequest, ListMetaRequest, PutRequest};
use docsync_store::{
    now_millis, Collection, Document, DocumentStore, Query, Timestamp, UpdateOptions,
};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Everything one collection's cycles need, shared by the engine's tasks.
pub(crate) struct Job {
    pub(crate) collection: Arc<Collection>,
    pub(crate) remote: Arc<dyn RemoteApi>,
    pub(crate) watermarks: Arc<dyn WatermarkStore>,
    pub(crate) config: SyncConfig,
    pub(crate) dirty: DirtyFlag,
    running: AtomicBool,
    phase: RwLock<SyncPhase>,
    stats: RwLock<SyncStats>,
}

impl Job {
    pub(crate) fn new(
        collection: Arc<Collection>,
        remote: Arc<dyn RemoteApi>,
        watermarks: Arc<dyn WatermarkStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            collection,
            remote,
            watermarks,
            config,
            dirty: DirtyFlag::new(),
            running: AtomicBool::new(false),
            phase: RwLock::new(SyncPhase::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn phase(&self) -> SyncPhase {
        *self.phase.read()
    }

    pub(crate) fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    fn set_phase(&self, phase: SyncPhase) {
        *self.phase.write() = phase;
    }

    /// Publishes pulled ids on the collection's remote channel.
    ///
    /// Never touches the dirty flag.
    pub(crate) fn on_remote_applied(&self, ids: Vec<String>) {
        self.collection.notify_remote_applied(ids);
    }

    /// Runs one cycle and records its outcome.
    ///
    /// On failure the dirty flag is set again so the next trigger retries
    /// the whole reconciliation.
    pub(crate) async fn run(&self) -> SyncResult<CycleOutcome> {
        self.running.store(true, Ordering::SeqCst);
        let result = self.run_guarded().await;
        self.running.store(false, Ordering::SeqCst);

        let collection = self.collection.name();
        match &result {
            Ok(CycleOutcome::Completed(report)) => tracing::info!(
                collection,
                pushed = report.pushed,
                pulled = report.pulled,
                watermark = report.watermark,
                elapsed_ms = report.duration.as_millis() as u64,
                "sync cycle completed"
            ),
            Ok(CycleOutcome::Skipped(reason)) => {
                tracing::debug!(collection, ?reason, "sync cycle skipped");
            }
            Err(err) => {
                self.dirty.set();
                self.set_phase(SyncPhase::Error);
                tracing::warn!(collection, error = %err, "sync cycle failed");
            }
        }

        self.stats.write().record(&result);
        result
    }

    async fn run_guarded(&self) -> SyncResult<CycleOutcome> {
        if !self.remote.is_authenticated() {
            return Ok(CycleOutcome::Skipped(SkipReason::Unauthenticated));
        }
        if !self.dirty.is_set() {
            return Ok(CycleOutcome::Skipped(SkipReason::Clean));
        }

        let started = Instant::now();
        // Only the remote exchange is bounded; local writes are never cut off.
        let exchange = match tokio::time::timeout(self.config.cycle_timeout, self.exchange()).await
        {
            Ok(result) => result?,
            Err(_) => return Err(SyncError::Timeout),
        };

        let pulled = self.apply(exchange.pulled).await?;

        let watermarks = Arc::clone(&self.watermarks);
        let key = self.collection.name().to_string();
        let now = now_millis();
        let watermark = blocking(move || watermarks.advance(&key, now)).await?;

        self.set_phase(SyncPhase::Synced);
        Ok(CycleOutcome::Completed(CycleReport {
            pushed: exchange.pushed,
            pulled,
            missing: exchange.missing,
            watermark,
            duration: started.elapsed(),
        }))
    }

    /// Lists both sides, pushes, and fetches the documents to pull.
    async fn exchange(&self) -> SyncResult<Exchange> {
        let name = self.collection.name();
        let remote_name = self.config.remote_name(name);

        self.set_phase(SyncPhase::FetchingMetadata);
        let generation = self.dirty.generation();
        let store = Arc::clone(self.collection.store());
        let meta_request = ListMetaRequest::new(remote_name);
        let (remote_meta, local_docs) = tokio::try_join!(
            self.remote.list_meta(&meta_request),
            blocking(move || store.find(&Query::All)),
        )?;

        // A mutation since the snapshot keeps the flag for the next cycle.
        if !self.dirty.clear_if(generation) {
            tracing::debug!(collection = name, "local write during listing, staying dirty");
        }

        let plan = classify(&local_index(&local_docs), &remote_index(&remote_meta.entries));
        tracing::debug!(
            collection = name,
            push = plan.push.len(),
            pull = plan.pull.len(),
            "classified changes"
        );

        let pushed = self.push(remote_name, &plan).await?;
        let (pulled, missing) = self.fetch(remote_name, &plan).await?;
        Ok(Exchange {
            pushed,
            pulled,
            missing,
        })
    }

    async fn push(&self, remote_name: &str, plan: &SyncPlan) -> SyncResult<usize> {
        if plan.push.is_empty() {
            return Ok(0);
        }
        self.set_phase(SyncPhase::Pushing);

        let store = Arc::clone(self.collection.store());
        let query = Query::Ids(plan.push_ids());
        let documents = blocking(move || store.find(&query)).await?;
        if documents.is_empty() {
            return Ok(0);
        }

        let count = documents.len();
        let response = self
            .remote
            .put(&PutRequest::upserts(remote_name, documents))
            .await?;
        if response.accepted < count as u64 {
            tracing::debug!(
                collection = self.collection.name(),
                sent = count,
                accepted = response.accepted,
                "remote kept newer versions of some pushed documents"
            );
        } else {
            tracing::debug!(
                collection = self.collection.name(),
                sent = count,
                "pushed documents"
            );
        }
        Ok(count)
    }

    async fn fetch(&self, remote_name: &str, plan: &SyncPlan) -> SyncResult<(Vec<Document>, usize)> {
        if plan.pull.is_empty() {
            return Ok((Vec::new(), 0));
        }
        self.set_phase(SyncPhase::Pulling);

        let wanted = plan.pull_mtimes();
        let response = self
            .remote
            .get(&GetRequest::new(remote_name, plan.pull_ids()))
            .await?;
        let documents = validate_pull(response.documents, &wanted)?;

        let missing = wanted.len() - documents.len();
        if missing > 0 {
            tracing::debug!(
                collection = self.collection.name(),
                missing,
                "remote did not return every requested document"
            );
        }
        Ok((documents, missing))
    }

    /// Writes pulled documents and announces the ones that landed.
    ///
    /// The notice goes out even when a later write fails, so readers see
    /// every document that was actually applied.
    async fn apply(&self, documents: Vec<Document>) -> SyncResult<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let store = Arc::clone(self.collection.store());
        let (applied, failure) = blocking(move || {
            let mut ids = Vec::with_capacity(documents.len());
            for doc in documents {
                let id = doc.id.clone();
                if let Err(e) = store.update(&Query::id(&id), doc, UpdateOptions::upsert()) {
                    return Ok::<_, SyncError>((ids, Some(SyncError::from(e))));
                }
                ids.push(id);
            }
            Ok((ids, None))
        })
        .await?;

        let count = applied.len();
        self.on_remote_applied(applied);
        match failure {
            Some(err) => Err(err),
            None => Ok(count),
        }
    }
}

/// Result of the remote half of a cycle.
struct Exchange {
    pushed: usize,
    pulled: Vec<Document>,
    missing: usize,
}

/// Checks a get response before anything is applied.
///
/// Every returned id must have been requested. Each document's `_mtime` is
/// replaced by the value from the metadata listing, so the next cycle sees
/// both sides as equal. Duplicates collapse to one document.
pub(crate) fn validate_pull(
    documents: Vec<Document>,
    wanted: &BTreeMap<String, Timestamp>,
) -> SyncResult<Vec<Document>> {
    let mut accepted = BTreeMap::new();
    for mut doc in documents {
        let Some(&mtime) = wanted.get(&doc.id) else {
            return Err(SyncError::malformed(format!(
                "document {:?} was not requested",
                doc.id
            )));
        };
        doc.mtime = mtime;
        accepted.insert(doc.id.clone(), doc);
    }
    Ok(accepted.into_values().collect())
}

async fn blocking<T, E, F>(f: F) -> SyncResult<T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<SyncError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Store(format!("store task failed: {e}")))?
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemote, RemoteOp};
    use crate::watermark::MemoryWatermarkStore;
    use serde_json::Map;

    fn doc(id: &str, mtime: Timestamp) -> Document {
        Document::new(id, Map::new()).with_times(1, mtime)
    }

    fn job(remote: Arc<MockRemote>) -> Job {
        Job::new(
            Arc::new(Collection::in_memory("notes")),
            remote,
            Arc::new(MemoryWatermarkStore::new()),
            SyncConfig::default(),
        )
    }

    #[test]
    fn unrequested_document_rejects_whole_response() {
        let wanted: BTreeMap<_, _> = [("a".to_string(), 5)].into_iter().collect();
        let result = validate_pull(vec![doc("a", 1), doc("zzz", 1)], &wanted);
        assert!(matches!(result, Err(SyncError::MalformedResponse(_))));
    }

    #[test]
    fn pulled_mtime_is_forced_to_listing() {
        let wanted: BTreeMap<_, _> = [("a".to_string(), 500)].into_iter().collect();
        let docs = validate_pull(vec![doc("a", 3), doc("a", 4)], &wanted).unwrap();
        assert_eq!(docs, vec![doc("a", 500)]);
    }

    struct ReadOnlyWatermarks;

    impl WatermarkStore for ReadOnlyWatermarks {
        fn load(&self, _collection: &str) -> Timestamp {
            0
        }

        fn save(&self, _collection: &str, _value: Timestamp) -> SyncResult<()> {
            Err(SyncError::Store("read-only file system".into()))
        }
    }

    #[tokio::test]
    async fn pulled_documents_are_announced_even_if_watermark_fails() {
        let remote = Arc::new(MockRemote::new());
        remote.insert("notes", doc("b", 200));
        let job = Job::new(
            Arc::new(Collection::in_memory("notes")),
            remote,
            Arc::new(ReadOnlyWatermarks),
            SyncConfig::default(),
        );
        let mut applied_rx = job.collection.subscribe_remote();
        job.dirty.set();

        assert_eq!(
            job.run().await,
            Err(SyncError::Store("read-only file system".into()))
        );
        assert_eq!(job.collection.get("b").unwrap().unwrap().mtime, 200);
        assert_eq!(applied_rx.try_recv().unwrap().ids, vec!["b"]);
        assert!(job.dirty.is_set());
    }

    #[tokio::test]
    async fn write_during_listing_keeps_dirty() {
        let remote = Arc::new(MockRemote::new());
        remote.set_latency(Some(std::time::Duration::from_millis(100)));
        let job = Arc::new(job(Arc::clone(&remote)));
        job.dirty.set();

        let running = {
            let job = Arc::clone(&job);
            tokio::spawn(async move { job.run().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        job.dirty.set();

        assert!(running.await.unwrap().is_ok());
        assert!(job.dirty.is_set());
    }

    #[tokio::test]
    async fn clean_job_is_skipped() {
        let remote = Arc::new(MockRemote::new());
        let job = job(Arc::clone(&remote));

        assert_eq!(
            job.run().await.unwrap(),
            CycleOutcome::Skipped(SkipReason::Clean)
        );
        assert_eq!(remote.calls(RemoteOp::ListMeta), 0);
        assert_eq!(job.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn unauthenticated_job_keeps_dirty() {
        let remote = Arc::new(MockRemote::new());
        remote.set_authenticated(false);
        let job = job(Arc::clone(&remote));
        job.dirty.set();

        assert_eq!(
            job.run().await.unwrap(),
            CycleOutcome::Skipped(SkipReason::Unauthenticated)
        );
        assert!(job.dirty.is_set());
        assert_eq!(job.stats().cycles_skipped, 1);
    }

    #[tokio::test]
    async fn failure_restores_dirty() {
        let remote = Arc::new(MockRemote::new());
        remote.fail_next(RemoteOp::Put, SyncError::transport_retryable("offline"));
        let job = job(Arc::clone(&remote));
        job.collection
            .store()
            .update(&Query::id("a"), doc("a", 100), UpdateOptions::upsert())
            .unwrap();
        job.dirty.set();

        assert!(job.run().await.is_err());
        assert!(job.dirty.is_set());
        assert_eq!(job.phase(), SyncPhase::Error);
        assert_eq!(job.watermarks.load("notes"), 0);
        assert_eq!(job.stats().cycles_failed, 1);

        let report = job.run().await.unwrap();
        assert_eq!(report.report().map(|r| r.pushed), Some(1));
        assert!(!job.dirty.is_set());
        assert!(job.watermarks.load("notes") > 0);
    }
}
