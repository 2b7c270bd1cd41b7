//! Per-collection sync engine.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::job::Job;
use crate::queue::{CycleWaiter, SingleFlight};
use crate::remote::RemoteApi;
use crate::state::{CycleOutcome, SyncPhase, SyncStats};
use crate::watermark::WatermarkStore;
use docsync_store::{Collection, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

/// Keeps one collection reconciled with the remote side.
///
/// Starting an engine spawns three kinds of tasks on the current Tokio
/// runtime:
///
/// - a worker that runs reconciliation cycles one at a time;
/// - a listener on the collection's local channel that marks it dirty on
///   every application write;
/// - optionally, a ticker that marks it dirty every `sync_interval`.
///
/// Documents pulled from the remote side are announced on the collection's
/// remote channel, which the engine does not listen to, so applying them
/// never schedules another cycle.
///
/// # Example
///
/// ```rust
/// use docsync_store::Collection;
/// use docsync_sync_engine::{MemoryWatermarkStore, MockRemote, SyncConfig, SyncEngine};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() {
/// let notes = Arc::new(Collection::in_memory("notes"));
/// let remote = Arc::new(MockRemote::new());
/// let engine = SyncEngine::start(
///     Arc::clone(&notes),
///     remote.clone(),
///     Arc::new(MemoryWatermarkStore::new()),
///     SyncConfig::default().with_initial_sync(false),
/// );
///
/// notes.insert(json!({"title": "hello"}).as_object().cloned().unwrap()).unwrap();
/// engine.trigger_sync().wait().await.unwrap();
/// assert_eq!(remote.documents("notes").len(), 1);
///
/// engine.shutdown().await;
/// # }
/// ```
pub struct SyncEngine {
    job: Arc<Job>,
    queue: Arc<SingleFlight>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    /// Starts syncing `collection`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(
        collection: Arc<Collection>,
        remote: Arc<dyn RemoteApi>,
        watermarks: Arc<dyn WatermarkStore>,
        config: SyncConfig,
    ) -> Self {
        let sync_interval = config.sync_interval;
        let initial_sync = config.initial_sync;
        // Subscribe before returning so writes right after start are seen.
        let local_rx = collection.subscribe_local();

        let job = Arc::new(Job::new(collection, remote, watermarks, config));
        let queue = Arc::new(SingleFlight::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut tasks = Vec::with_capacity(3);
        tasks.push(tokio::spawn(run_worker(Arc::clone(&job), Arc::clone(&queue))));
        tasks.push(tokio::spawn(listen_local(
            Arc::clone(&job),
            Arc::clone(&queue),
            local_rx,
            shutdown_rx.clone(),
        )));
        if let Some(period) = sync_interval {
            tasks.push(tokio::spawn(tick(
                Arc::clone(&job),
                Arc::clone(&queue),
                period,
                shutdown_rx,
            )));
        }

        tracing::debug!(
            collection = job.collection.name(),
            interval = ?sync_interval,
            "sync engine started"
        );

        let engine = Self {
            job,
            queue,
            shutdown,
            tasks: Mutex::new(tasks),
        };
        if initial_sync {
            engine.mark_dirty();
        }
        engine
    }

    /// Returns the synced collection.
    pub fn collection(&self) -> &Arc<Collection> {
        &self.job.collection
    }

    /// Marks the collection dirty and schedules a cycle. Never blocks.
    pub fn mark_dirty(&self) {
        mark_dirty(&self.job, &self.queue);
    }

    /// Marks the collection dirty and schedules a cycle.
    ///
    /// The returned waiter resolves with the outcome of the cycle that
    /// observes this request. Dropping it is fine.
    pub fn trigger_sync(&self) -> CycleWaiter {
        self.job.dirty.set();
        self.queue.request()
    }

    /// Triggers a cycle and waits for it.
    pub async fn sync_now(&self) -> SyncResult<CycleOutcome> {
        self.trigger_sync().wait().await
    }

    /// Publishes ids applied from the remote side without marking dirty.
    pub fn on_remote_applied(&self, ids: Vec<String>) {
        self.job.on_remote_applied(ids);
    }

    /// Returns the dirty flag.
    pub fn is_dirty(&self) -> bool {
        self.job.dirty.is_set()
    }

    /// Returns true while a cycle executes.
    pub fn is_running(&self) -> bool {
        self.job.is_running()
    }

    /// Gets the current phase.
    pub fn phase(&self) -> SyncPhase {
        self.job.phase()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.job.stats()
    }

    /// Loads the persisted watermark.
    pub fn watermark(&self) -> Timestamp {
        self.job.watermarks.load(self.job.collection.name())
    }

    /// Stops every task.
    ///
    /// A cycle already running finishes first; queued waiters resolve with
    /// [`SyncError::Cancelled`](crate::SyncError::Cancelled).
    pub async fn shutdown(&self) {
        self.signal_shutdown();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "sync task ended abnormally");
            }
        }
        tracing::debug!(collection = self.job.collection.name(), "sync engine stopped");
    }

    fn signal_shutdown(&self) {
        self.queue.close();
        let _ = self.shutdown.send(true);
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.signal_shutdown();
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("collection", &self.job.collection.name())
            .field("phase", &self.job.phase())
            .field("dirty", &self.job.dirty.is_set())
            .finish_non_exhaustive()
    }
}

fn mark_dirty(job: &Job, queue: &SingleFlight) {
    job.dirty.set();
    // Background trigger: the outcome is logged by the job.
    drop(queue.request());
}

async fn run_worker(job: Arc<Job>, queue: Arc<SingleFlight>) {
    queue.run(|| job.run()).await;
}

async fn listen_local(
    job: Arc<Job>,
    queue: Arc<SingleFlight>,
    mut rx: broadcast::Receiver<docsync_store::LocalChange>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(_) => mark_dirty(&job, &queue),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "local change feed lagged");
                    mark_dirty(&job, &queue);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }
}

async fn tick(
    job: Arc<Job>,
    queue: Arc<SingleFlight>,
    period: std::time::Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => mark_dirty(&job, &queue),
            _ = shutdown.changed() => break,
        }
    }
}
