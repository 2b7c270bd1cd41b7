//! Store configuration.

/// Configuration for opening a data directory.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to fsync the document log after every write (safer but slower).
    pub sync_on_write: bool,

    /// Capacity of each change-feed channel before slow subscribers lag.
    pub feed_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: true,
            feed_capacity: 1024,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to fsync on every write.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }

    /// Sets the change-feed channel capacity.
    #[must_use]
    pub const fn feed_capacity(mut self, capacity: usize) -> Self {
        self.feed_capacity = capacity;
        self
    }
}
