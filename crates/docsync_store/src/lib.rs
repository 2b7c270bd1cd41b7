//! # docsync Store
//!
//! Embedded document store for docsync.
//!
//! This crate provides:
//! - [`Document`] - a record keyed by `_id` with `_ctime`/`_mtime` and an opaque body
//! - [`DocumentStore`] - the find / update / remove primitive the sync engine consumes
//! - [`MemoryStore`] and [`FileStore`] implementations
//! - [`Collection`] - the local mutation surface with its change feed
//! - [`Registry`] - an explicit owner of named collections in a data directory
//!
//! ## Change notification
//!
//! Every collection exposes two independent channels:
//! - local changes (application writes), which drive synchronization
//! - remote-applied notices (data pulled from the server), which only refresh readers
//!
//! ## Example
//!
//! ```rust
//! use docsync_store::{Collection, Query};
//! use serde_json::json;
//!
//! let notes = Collection::in_memory("notes");
//! let doc = notes.insert(json!({"title": "groceries"}).as_object().cloned().unwrap()).unwrap();
//!
//! let found = notes.find(&Query::id(&doc.id)).unwrap();
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].body["title"], "groceries");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod collection;
mod config;
mod dir;
mod document;
mod error;
mod file;
mod memory;
mod query;
mod registry;
mod store;

pub use change_feed::{ChangeFeed, LocalChange, LocalChangeKind, RemoteApplied};
pub use collection::Collection;
pub use config::StoreConfig;
pub use dir::{sync_directory, sync_path_for, DataDir, SYNC_SUFFIX};
pub use document::{now_millis, Document, Timestamp};
pub use error::{StoreError, StoreResult};
pub use file::{FileStore, LogStats};
pub use memory::MemoryStore;
pub use query::{Query, UpdateOptions};
pub use registry::Registry;
pub use store::DocumentStore;
