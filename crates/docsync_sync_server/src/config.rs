//! Server configuration.

/// Configuration for the reference datastore.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum number of changes accepted in one put.
    pub max_put_batch: usize,
    /// Maximum number of ids accepted in one get.
    pub max_get_batch: usize,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_put_batch: 10_000,
            max_get_batch: 10_000,
        }
    }

    /// Sets the maximum put batch size.
    pub fn with_max_put_batch(mut self, size: usize) -> Self {
        self.max_put_batch = size;
        self
    }

    /// Sets the maximum get batch size.
    pub fn with_max_get_batch(mut self, size: usize) -> Self {
        self.max_get_batch = size;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
