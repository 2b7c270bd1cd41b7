//! Single-flight scheduling of reconciliation cycles.
//!
//! Triggers never block. A trigger that arrives while a cycle is queued or
//! running folds into exactly one follow-up cycle: the [`Notify`] permit
//! holds at most one pending wakeup, and every waiter registered before a
//! cycle starts is answered by that cycle.

use crate::error::{SyncError, SyncResult};
use crate::state::CycleOutcome;
use parking_lot::Mutex;
use std::future::Future;
use tokio::sync::{oneshot, Notify};

type Reply = oneshot::Sender<SyncResult<CycleOutcome>>;

/// Resolves with the outcome of the cycle that observed a trigger.
#[derive(Debug)]
#[must_use = "dropping the waiter ignores the cycle outcome"]
pub struct CycleWaiter {
    rx: oneshot::Receiver<SyncResult<CycleOutcome>>,
}

impl CycleWaiter {
    /// Waits for the cycle.
    ///
    /// Returns [`SyncError::Cancelled`] if the engine shut down first.
    pub async fn wait(self) -> SyncResult<CycleOutcome> {
        self.rx.await.unwrap_or(Err(SyncError::Cancelled))
    }

    fn resolved(result: SyncResult<CycleOutcome>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { rx }
    }
}

#[derive(Debug, Default)]
struct Waiters {
    pending: Vec<Reply>,
    closed: bool,
}

/// Runs cycles one at a time, coalescing triggers.
#[derive(Debug, Default)]
pub(crate) struct SingleFlight {
    notify: Notify,
    waiters: Mutex<Waiters>,
}

impl SingleFlight {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enqueues a run.
    pub(crate) fn request(&self) -> CycleWaiter {
        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.waiters.lock();
            if waiters.closed {
                return CycleWaiter::resolved(Err(SyncError::Cancelled));
            }
            waiters.pending.push(tx);
        }
        self.notify.notify_one();
        CycleWaiter { rx }
    }

    /// Stops the worker after its current run.
    pub(crate) fn close(&self) {
        self.waiters.lock().closed = true;
        self.notify.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.waiters.lock().closed
    }

    /// Worker loop: waits for requests and runs `cycle` for each batch.
    pub(crate) async fn run<F, Fut>(&self, mut cycle: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<CycleOutcome>>,
    {
        loop {
            self.notify.notified().await;

            let batch = {
                let mut waiters = self.waiters.lock();
                if waiters.closed {
                    break;
                }
                std::mem::take(&mut waiters.pending)
            };

            let result = cycle().await;
            for reply in batch {
                let _ = reply.send(result.clone());
            }
        }

        let abandoned = std::mem::take(&mut self.waiters.lock().pending);
        for reply in abandoned {
            let _ = reply.send(Err(SyncError::Cancelled));
        }
    }
}
