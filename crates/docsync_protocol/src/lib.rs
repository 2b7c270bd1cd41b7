//! # docsync Protocol
//!
//! Wire types and CBOR codecs for the remote datastore API.
//!
//! This crate provides:
//! - [`ListMetaRequest`] / [`ListMetaResponse`] - the `(id, mtime)` listing of a remote collection
//! - [`PutRequest`] / [`PutResponse`] - a batch of upserts and tombstones
//! - [`GetRequest`] / [`GetResponse`] - full documents by id
//! - [`SyncMessage`] - a type-coded envelope over all of the above
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod error;
mod messages;

pub use change::Change;
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    decode, encode, GetRequest, GetResponse, ListMetaRequest, ListMetaResponse, MetaEntry,
    PutRequest, PutResponse, SyncMessage, GET_PATH, META_PATH, PUT_PATH,
};
