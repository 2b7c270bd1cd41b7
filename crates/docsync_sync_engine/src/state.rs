//! Engine phases, cycle outcomes and statistics.

use docsync_store::Timestamp;
use std::time::Duration;

/// What the engine is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle has run yet.
    Idle,
    /// Listing remote metadata and scanning the local store.
    FetchingMetadata,
    /// Sending local documents to the remote side.
    Pushing,
    /// Fetching and applying remote documents.
    Pulling,
    /// The last cycle completed.
    Synced,
    /// The last cycle failed.
    Error,
}

impl SyncPhase {
    /// Returns true while a cycle is executing.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncPhase::FetchingMetadata | SyncPhase::Pushing | SyncPhase::Pulling
        )
    }
}

/// Why a cycle did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote client has no session.
    Unauthenticated,
    /// Nothing marked the collection dirty since the last cycle.
    Clean,
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Documents sent upstream.
    pub pushed: usize,
    /// Documents written locally from the remote side.
    pub pulled: usize,
    /// Requested documents the remote side did not return.
    pub missing: usize,
    /// Watermark after the cycle.
    pub watermark: Timestamp,
    /// Wall time of the cycle.
    pub duration: Duration,
}

/// Result of one run of the reconciliation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Preconditions did not hold; nothing was touched.
    Skipped(SkipReason),
    /// A full reconciliation ran.
    Completed(CycleReport),
}

impl CycleOutcome {
    /// Returns true for skipped cycles.
    pub fn is_skipped(&self) -> bool {
        matches!(self, CycleOutcome::Skipped(_))
    }

    /// Returns the report of a completed cycle.
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Skipped(_) => None,
        }
    }
}

/// Counters across the lifetime of an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Cycles that ran to completion.
    pub cycles_completed: u64,
    /// Cycles skipped by a precondition.
    pub cycles_skipped: u64,
    /// Cycles aborted by an error.
    pub cycles_failed: u64,
    /// Total documents pushed.
    pub documents_pushed: u64,
    /// Total documents pulled.
    pub documents_pulled: u64,
    /// Watermark written by the last completed cycle.
    pub last_sync: Option<Timestamp>,
    /// Message of the last failure, cleared on success.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record(&mut self, result: &Result<CycleOutcome, crate::SyncError>) {
        match result {
            Ok(CycleOutcome::Skipped(_)) => self.cycles_skipped += 1,
            Ok(CycleOutcome::Completed(report)) => {
                self.cycles_completed += 1;
                self.documents_pushed += report.pushed as u64;
                self.documents_pulled += report.pulled as u64;
                self.last_sync = Some(report.watermark);
                self.last_error = None;
            }
            Err(err) => {
                self.cycles_failed += 1;
                self.last_error = Some(err.to_string());
            }
        }
    }
}
