//! Protocol error types.

use thiserror::Error;

/// Errors raised while encoding or decoding protocol messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Bytes did not decode into the expected message.
    #[error("decode error: {0}")]
    Decode(String),

    /// The envelope carried an unknown type code.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// The envelope was empty.
    #[error("empty message")]
    Empty,
}

impl ProtocolError {
    /// Creates an encode error.
    pub fn encode(err: impl std::fmt::Display) -> Self {
        Self::Encode(err.to_string())
    }

    /// Creates a decode error.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
