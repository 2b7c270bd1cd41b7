//! Error types for the reference datastore.

use docsync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the reference datastore.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request contents.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A batch exceeded the configured limit.
    #[error("batch too large: {actual} > {limit}")]
    BatchTooLarge {
        /// Configured limit.
        limit: usize,
        /// Size of the rejected batch.
        actual: usize,
    },

    /// No handler for this path.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The body could not be decoded or the reply encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::InvalidRequest(_)
            | ServerError::BatchTooLarge { .. }
            | ServerError::UnknownEndpoint(_) => true,
            ServerError::Protocol(e) => !matches!(e, ProtocolError::Encode(_)),
        }
    }
}
