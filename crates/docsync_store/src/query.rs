//! Queries and update options.

/// Selects documents by id.
///
/// The store only needs to answer "everything" and "these ids"; richer
/// matching belongs to the model layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Every document in the collection.
    All,
    /// A single document.
    Id(String),
    /// Any of the listed documents.
    Ids(Vec<String>),
}

impl Query {
    /// Selects one id.
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Selects a set of ids.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }

    /// Returns true if the query selects `id`.
    pub fn matches(&self, id: &str) -> bool {
        match self {
            Query::All => true,
            Query::Id(wanted) => wanted == id,
            Query::Ids(wanted) => wanted.iter().any(|w| w == id),
        }
    }
}

/// Options for [`crate::DocumentStore::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert the document when nothing matches.
    pub upsert: bool,
}

impl UpdateOptions {
    /// Options with upsert enabled.
    pub const fn upsert() -> Self {
        Self { upsert: true }
    }
}
