//! Document store trait definition.

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::query::{Query, UpdateOptions};

/// A keyed collection of documents.
///
/// This is the primitive both application writes and the sync engine's
/// pull phase go through. Implementations serialize mutations internally,
/// so `update` is atomic with respect to concurrent callers and no external
/// locking is needed.
///
/// # Invariants
///
/// - At most one document exists per `_id`
/// - `update` replaces the whole document, body included
/// - `find` returns documents in ascending `_id` order
///
/// # Implementors
///
/// - [`crate::MemoryStore`] - For testing and ephemeral collections
/// - [`crate::FileStore`] - Append-only log on disk
pub trait DocumentStore: Send + Sync {
    /// Returns every document selected by `query`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn find(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Replaces the document whose id is `doc.id`, if `query` selects it.
    ///
    /// With `options.upsert`, the document is inserted when it does not
    /// exist yet. Returns the number of documents written (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidUpdate`] if `query` does not select
    /// `doc.id`, or an I/O error from the backing storage.
    fn update(&self, query: &Query, doc: Document, options: UpdateOptions) -> StoreResult<usize>;

    /// Removes every document selected by `query`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn remove(&self, query: &Query) -> StoreResult<usize>;

    /// Returns the number of documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn len(&self) -> StoreResult<usize>;

    /// Returns true if the store holds no documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Fetches a single document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, id: &str) -> StoreResult<Option<Document>> {
        Ok(self.find(&Query::id(id))?.into_iter().next())
    }
}

/// Checks that an update query selects the replacement document.
pub(crate) fn check_update_target(query: &Query, doc: &Document) -> StoreResult<()> {
    if query.matches(&doc.id) {
        Ok(())
    } else {
        Err(StoreError::InvalidUpdate(format!(
            "query {query:?} does not select document {:?}",
            doc.id
        )))
    }
}
