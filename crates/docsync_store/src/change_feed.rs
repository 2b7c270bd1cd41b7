//! Change feed for observing collection writes.
//!
//! A collection publishes on two separate channels:
//!
//! - **local**: the application inserted, updated or removed documents.
//!   The sync engine listens here and schedules a reconciliation.
//! - **remote**: the sync engine applied documents pulled from the server.
//!   Readers refresh; nothing schedules a new reconciliation from this.
//!
//! Keeping them apart is what prevents a pull from looking like a local
//! edit and re-triggering sync forever.

use tokio::sync::broadcast;

/// Kind of local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalChangeKind {
    /// Document did not exist before.
    Insert,
    /// Document existed and was replaced.
    Update,
    /// Document was removed.
    Remove,
}

/// An application write to a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalChange {
    /// Collection name.
    pub collection: String,
    /// Affected document ids.
    pub ids: Vec<String>,
    /// Kind of write.
    pub kind: LocalChangeKind,
}

/// Documents pulled from the remote side and written locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteApplied {
    /// Collection name.
    pub collection: String,
    /// Ids of the applied documents.
    pub ids: Vec<String>,
}

/// Broadcasts collection changes to any number of subscribers.
///
/// Events published while nobody is subscribed are dropped.
#[derive(Debug)]
pub struct ChangeFeed {
    local: broadcast::Sender<LocalChange>,
    remote: broadcast::Sender<RemoteApplied>,
}

impl ChangeFeed {
    /// Creates a feed whose channels each buffer `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (local, _) = broadcast::channel(capacity.max(1));
        let (remote, _) = broadcast::channel(capacity.max(1));
        Self { local, remote }
    }

    /// Subscribes to application writes.
    pub fn subscribe_local(&self) -> broadcast::Receiver<LocalChange> {
        self.local.subscribe()
    }

    /// Subscribes to remote-applied notices.
    pub fn subscribe_remote(&self) -> broadcast::Receiver<RemoteApplied> {
        self.remote.subscribe()
    }

    /// Publishes an application write.
    pub fn emit_local(&self, change: LocalChange) {
        let _ = self.local.send(change);
    }

    /// Publishes a remote-applied notice.
    pub fn emit_remote(&self, applied: RemoteApplied) {
        let _ = self.remote.send(applied);
    }

    /// Number of local-channel subscribers.
    pub fn local_subscribers(&self) -> usize {
        self.local.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(1024)
    }
}
