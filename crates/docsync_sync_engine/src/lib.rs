//! # docsync Sync Engine
//!
//! Keeps docsync collections reconciled with a remote datastore.
//!
//! This crate provides:
//! - Dirty flag and trigger surface (local writes, explicit requests, interval)
//! - Single-flight scheduling with trigger coalescing
//! - The reconciliation job (classify, push, pull, advance watermark)
//! - Persisted per-collection watermarks
//! - The [`RemoteApi`] abstraction with mock, HTTP and loopback adapters
//!
//! ## Reconciliation
//!
//! Each cycle compares full `(id, mtime)` listings of both sides:
//! 1. List remote metadata and scan the local store, concurrently
//! 2. Clear the dirty flag, unless a local write arrived during step 1
//! 3. Push documents that are newer (or only present) locally
//! 4. Pull documents that are newer (or only present) remotely
//! 5. Announce applied ids on the remote channel and advance the watermark
//!
//! ## Key Invariants
//!
//! - At most one cycle per collection runs at any instant
//! - The watermark only moves forward, and only after a successful cycle
//! - Applying pulled documents never schedules another cycle
//! - A failed cycle leaves the collection dirty
//!
//! ## Known gap
//!
//! Deletions are not propagated. A document removed locally is still listed
//! remotely and gets pulled back; the engine never sends tombstones.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod job;
mod queue;
mod reconcile;
mod registry;
mod remote;
mod state;
mod trigger;
mod watermark;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use http::{CborDecode, CborEncode, HttpClient, HttpRemote, LoopbackClient, LoopbackServer};
pub use queue::CycleWaiter;
pub use reconcile::{classify, local_index, remote_index, ChangeRecord, Origin, SyncPlan};
pub use registry::SyncRegistry;
pub use remote::{MockRemote, RemoteApi, RemoteOp};
pub use state::{CycleOutcome, CycleReport, SkipReason, SyncPhase, SyncStats};
pub use trigger::DirtyFlag;
pub use watermark::{FileWatermarkStore, MemoryWatermarkStore, WatermarkStore};
