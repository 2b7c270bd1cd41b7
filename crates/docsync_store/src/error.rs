//! Error types for the document store.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// The document log is corrupted.
    #[error("store corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the data directory.
    #[error("data directory locked: another process has exclusive access")]
    Locked,

    /// The data directory does not exist and creation was not requested.
    #[error("data directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    /// Collection names must be usable as file names.
    #[error("invalid collection name: {0:?}")]
    InvalidName(String),

    /// An update whose query does not select the replacement document.
    #[error("invalid update: {0}")]
    InvalidUpdate(String),
}

impl StoreError {
    /// Creates a codec error from any displayable cause.
    pub fn codec(cause: impl std::fmt::Display) -> Self {
        Self::Codec(cause.to_string())
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted(message.into())
    }
}
