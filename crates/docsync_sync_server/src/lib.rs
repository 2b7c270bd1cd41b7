//! # docsync Sync Server
//!
//! Reference remote datastore for docsync.
//!
//! This crate provides:
//! - The three datastore endpoints (list metadata, put, get)
//! - In-memory per-collection storage with tombstones
//! - Last-write-by-timestamp acceptance of upserts
//!
//! It is the counterpart the sync engine's HTTP and loopback remotes talk
//! to, and backs the engine's integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod datastore;
mod error;
mod handler;
mod server;

pub use config::ServerConfig;
pub use datastore::Datastore;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::SyncServer;
