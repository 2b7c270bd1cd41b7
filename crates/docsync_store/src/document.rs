//! Document representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// Returns the current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| Timestamp::try_from(d.as_millis()).unwrap_or(Timestamp::MAX))
        .unwrap_or(0)
}

/// A stored document.
///
/// Only `_id`, `_ctime` and `_mtime` carry meaning for the store and the
/// sync engine. Everything else lives in `body` and is carried verbatim,
/// key order included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Creation instant.
    #[serde(rename = "_ctime", default)]
    pub ctime: Timestamp,
    /// Last modification instant.
    #[serde(rename = "_mtime", default)]
    pub mtime: Timestamp,
    /// Opaque payload.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Document {
    /// Creates a document with zeroed timestamps.
    pub fn new(id: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            ctime: 0,
            mtime: 0,
            body,
        }
    }

    /// Sets both timestamps.
    #[must_use]
    pub fn with_times(mut self, ctime: Timestamp, mtime: Timestamp) -> Self {
        self.ctime = ctime;
        self.mtime = mtime;
        self
    }

    /// Sets the modification instant.
    #[must_use]
    pub fn with_mtime(mut self, mtime: Timestamp) -> Self {
        self.mtime = mtime;
        self
    }

    /// Returns a body field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}
