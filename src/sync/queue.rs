//! Dependency-aware operation queue on a bounded worker pool.
//!
//! Each submitted operation is spawned as a tokio task that first awaits
//! every dependency's terminal state, then claims a concurrency permit and
//! runs the work. There is no ordering guarantee between operations beyond
//! their declared dependencies; callers must not assume completion order.

use crate::sync::operation::{Operation, OperationHandle};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;

/// Default worker-pool width. Sync cycles are a handful of dependent
/// network calls; wider pools just pile onto the transport's pacing floor.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// A queue of operations sharing one concurrency budget.
///
/// Cheap to clone; clones share the pool and the cancel-all switch.
#[derive(Clone)]
pub struct OperationQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    permits: Arc<Semaphore>,
    handles: Mutex<Vec<OperationHandle>>,
}

impl Default for OperationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl OperationQueue {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
                handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Submit an operation. It becomes eligible to run once every
    /// dependency reaches a terminal state (finished or cancelled).
    pub fn add(&self, operation: Operation) -> OperationHandle {
        let handle = operation.handle();
        self.inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle.clone());

        let permits = Arc::clone(&self.inner.permits);
        tokio::spawn(run_operation(operation, permits));
        handle
    }

    /// Cancel every operation submitted so far. Pending ones never start;
    /// running ones have their work dropped at the next await point.
    pub fn cancel_all(&self) {
        let handles = self
            .inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut cancelled = 0;
        for handle in &handles {
            if handle.cancel() {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::debug!(cancelled = cancelled, "Cancelled queued operations");
        }
    }

    /// Wait for every operation submitted so far to reach a terminal state.
    pub async fn wait_all(&self) {
        let handles = self
            .inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handle in handles {
            handle.wait().await;
        }
    }

    /// Handles of all operations submitted so far, in submission order.
    pub fn handles(&self) -> Vec<OperationHandle> {
        self.inner
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn run_operation(operation: Operation, permits: Arc<Semaphore>) {
    let Operation {
        handle,
        dependencies,
        work,
    } = operation;

    for dep in &dependencies {
        dep.wait().await;
    }

    // Cancellation may have landed while we waited on dependencies; the
    // permit is only claimed for work that will actually run.
    if handle.state().is_terminal() {
        return;
    }

    let _permit = match permits.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => return, // pool shut down
    };

    if !handle.transition_running() {
        return; // cancelled before start
    }

    tracing::debug!(operation = %handle.name(), "Operation running");

    // Race the work against our own terminal notification: the only way we
    // can go terminal while Running is an external cancel, in which case
    // the work future is dropped at its current await point.
    let canceller = handle.clone();
    tokio::select! {
        biased;
        result = work => {
            if let Err(e) = &result {
                tracing::warn!(operation = %handle.name(), error = %e, "Operation failed");
            }
            handle.finish(result);
        }
        _ = canceller.wait() => {
            tracing::debug!(operation = %handle.name(), "Operation aborted by cancel");
        }
    }
}
