//! Entries of a put batch.

use docsync_store::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const DELETE_FIELD: &str = "_delete";

/// One entry of a [`PutRequest`](crate::PutRequest).
///
/// On the wire an upsert is the document itself and a deletion is a
/// tombstone `{_id, _delete: true}`. Any document carrying `_delete: true`
/// decodes as a deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Document", into = "Document")]
pub enum Change {
    /// Insert or replace the document.
    Upsert(Document),
    /// Delete the document with this id.
    Delete(String),
}

impl Change {
    /// Creates a tombstone.
    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete(id.into())
    }

    /// Returns the id this change targets.
    pub fn id(&self) -> &str {
        match self {
            Self::Upsert(doc) => &doc.id,
            Self::Delete(id) => id,
        }
    }

    /// Returns true for tombstones.
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete(_))
    }
}

impl From<Document> for Change {
    fn from(doc: Document) -> Self {
        if doc.body.get(DELETE_FIELD) == Some(&Value::Bool(true)) {
            Self::Delete(doc.id)
        } else {
            Self::Upsert(doc)
        }
    }
}

impl From<Change> for Document {
    fn from(change: Change) -> Self {
        match change {
            Change::Upsert(doc) => doc,
            Change::Delete(id) => {
                let mut body = Map::new();
                body.insert(DELETE_FIELD.to_string(), Value::Bool(true));
                Document::new(id, body)
            }
        }
    }
}
