//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for one collection's sync engine.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Name of the collection on the remote side. Defaults to the local name.
    pub remote_collection: Option<String>,
    /// Upper bound on a whole reconciliation cycle.
    pub cycle_timeout: Duration,
    /// Mark the collection dirty on this period, if set.
    pub sync_interval: Option<Duration>,
    /// Run one cycle as soon as the engine starts.
    pub initial_sync: bool,
}

impl SyncConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            remote_collection: None,
            cycle_timeout: Duration::from_secs(30),
            sync_interval: None,
            initial_sync: true,
        }
    }

    /// Sets the remote collection name.
    pub fn with_remote_collection(mut self, name: impl Into<String>) -> Self {
        self.remote_collection = Some(name.into());
        self
    }

    /// Sets the cycle timeout.
    pub fn with_cycle_timeout(mut self, timeout: Duration) -> Self {
        self.cycle_timeout = timeout;
        self
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Enables or disables the cycle at startup.
    pub fn with_initial_sync(mut self, enabled: bool) -> Self {
        self.initial_sync = enabled;
        self
    }

    /// Resolves the remote collection name for a local collection.
    pub fn remote_name<'a>(&'a self, local: &'a str) -> &'a str {
        self.remote_collection.as_deref().unwrap_or(local)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
