//! The dirty flag.

use std::sync::atomic::{AtomicU64, Ordering};

/// Records that local state may differ from the remote side.
///
/// Internally a generation counter: 0 means clean, and every
/// [`DirtyFlag::set`] bumps it. The job takes a [`DirtyFlag::generation`]
/// snapshot before reading both sides and clears with
/// [`DirtyFlag::clear_if`], which only succeeds if nothing marked the flag
/// in between. A mutation that races the read keeps the collection dirty,
/// so the follow-up cycle it queued still runs.
#[derive(Debug, Default)]
pub struct DirtyFlag(AtomicU64);

impl DirtyFlag {
    /// Creates a clean flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks dirty.
    pub fn set(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |g| {
                Some(g.checked_add(1).unwrap_or(1))
            });
    }

    /// Returns the current generation (0 when clean).
    pub fn generation(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Clears the flag if it is still at `generation`.
    ///
    /// Returns false if the flag was marked again since the snapshot.
    pub fn clear_if(&self, generation: u64) -> bool {
        self.0
            .compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Clears the flag unconditionally, returning whether it was set.
    pub fn clear(&self) -> bool {
        self.0.swap(0, Ordering::SeqCst) != 0
    }

    /// Returns true if the flag is set.
    pub fn is_set(&self) -> bool {
        self.generation() != 0
    }
}
