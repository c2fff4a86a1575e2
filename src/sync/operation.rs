//! A unit of asynchronous sync work with lifecycle state and dependencies.
//!
//! An operation is created `Pending` with an optional dependency list,
//! becomes `Running` exactly once, and ends in exactly one of three terminal
//! states: `Succeeded`, `Failed`, or `Cancelled`. The terminal transition is
//! guarded and idempotent (the first writer wins, later attempts are no-ops),
//! which lets cancellation race safely against completion.

use crate::transport::ApiError;
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;

/// Failure of an operation's work, cheap to clone so every observer of the
/// handle can see it.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct OperationError(pub Arc<ApiError>);

impl From<ApiError> for OperationError {
    fn from(e: ApiError) -> Self {
        Self(Arc::new(e))
    }
}

/// Lifecycle state of an operation.
#[derive(Debug, Clone)]
pub enum OperationState {
    Pending,
    Running,
    Succeeded,
    Failed(OperationError),
    Cancelled,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Succeeded | OperationState::Failed(_) | OperationState::Cancelled
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationState::Cancelled)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, OperationState::Succeeded)
    }

    pub fn failure(&self) -> Option<&OperationError> {
        match self {
            OperationState::Failed(e) => Some(e),
            _ => None,
        }
    }
}

type CancelHook = Box<dyn FnOnce() + Send>;

struct Shared {
    name: String,
    state: Mutex<OperationState>,
    /// Bumped on every terminal transition; `wait` parks on it.
    terminal: watch::Sender<bool>,
    /// Invoked once when the operation is cancelled; compound operations
    /// use this to cascade into their nested queue.
    on_cancel: Mutex<Option<CancelHook>>,
}

impl Shared {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, OperationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheap-clone observer of one operation's lifecycle.
#[derive(Clone)]
pub struct OperationHandle {
    shared: Arc<Shared>,
}

impl OperationHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> OperationState {
        self.shared.lock_state().clone()
    }

    /// Wait until the operation reaches a terminal state and return it.
    pub async fn wait(&self) -> OperationState {
        let mut rx = self.shared.terminal.subscribe();
        loop {
            let state = self.state();
            if state.is_terminal() {
                return state;
            }
            // Sender lives in self.shared, so changed() cannot error while
            // we hold the handle.
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Cancel the operation. Returns true if this call performed the
    /// transition; false if it was already terminal.
    pub fn cancel(&self) -> bool {
        let transitioned = {
            let mut state = self.shared.lock_state();
            if state.is_terminal() {
                false
            } else {
                *state = OperationState::Cancelled;
                true
            }
        };
        if transitioned {
            let hook = self
                .shared
                .on_cancel
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(hook) = hook {
                hook();
            }
            tracing::debug!(operation = %self.shared.name, "Operation cancelled");
            self.shared.terminal.send_replace(true);
        }
        transitioned
    }

    /// Pending → Running. Returns false if the operation was cancelled
    /// before it could start (the work must not run in that case).
    pub(crate) fn transition_running(&self) -> bool {
        let mut state = self.shared.lock_state();
        match *state {
            OperationState::Pending => {
                *state = OperationState::Running;
                true
            }
            _ => false,
        }
    }

    /// Record the work's outcome. Idempotent: a finish after cancellation
    /// (or a duplicate finish) is ignored, preserving the first terminal
    /// state.
    pub(crate) fn finish(&self, outcome: Result<(), OperationError>) -> bool {
        let transitioned = {
            let mut state = self.shared.lock_state();
            if state.is_terminal() {
                tracing::debug!(
                    operation = %self.shared.name,
                    "Finish after terminal state ignored"
                );
                false
            } else {
                *state = match outcome {
                    Ok(()) => OperationState::Succeeded,
                    Err(e) => OperationState::Failed(e),
                };
                true
            }
        };
        if transitioned {
            self.shared.terminal.send_replace(true);
        }
        transitioned
    }
}

pub(crate) type Work = BoxFuture<'static, Result<(), OperationError>>;

/// A pending unit of work plus the dependency handles gating it.
///
/// Constructed, wired to its dependencies, and then submitted to an
/// [`crate::sync::OperationQueue`]; not reused across sync cycles.
pub struct Operation {
    pub(crate) handle: OperationHandle,
    pub(crate) dependencies: Vec<OperationHandle>,
    pub(crate) work: Work,
}

impl Operation {
    pub fn new<F>(name: impl Into<String>, work: F) -> Self
    where
        F: Future<Output = Result<(), OperationError>> + Send + 'static,
    {
        let (terminal, _) = watch::channel(false);
        Self {
            handle: OperationHandle {
                shared: Arc::new(Shared {
                    name: name.into(),
                    state: Mutex::new(OperationState::Pending),
                    terminal,
                    on_cancel: Mutex::new(None),
                }),
            },
            dependencies: Vec::new(),
            work: Box::pin(work),
        }
    }

    /// Gate this operation on the given handles reaching a terminal state.
    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = OperationHandle>) -> Self {
        self.dependencies.extend(deps);
        self
    }

    /// Install a hook invoked once if the operation is cancelled.
    pub fn on_cancel(self, hook: impl FnOnce() + Send + 'static) -> Self {
        *self
            .handle
            .shared
            .on_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(hook));
        self
    }

    pub fn handle(&self) -> OperationHandle {
        self.handle.clone()
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_operation_is_pending() {
        let op = Operation::new("fetch", async { Ok(()) });
        assert!(matches!(op.handle().state(), OperationState::Pending));
    }

    #[tokio::test]
    async fn test_finish_is_idempotent() {
        let op = Operation::new("fetch", async { Ok(()) });
        let handle = op.handle();

        assert!(handle.transition_running());
        assert!(handle.finish(Ok(())));
        // Second finish must not overwrite the first terminal state
        assert!(!handle.finish(Err(OperationError::from(ApiError::NoData))));
        assert!(handle.state().is_succeeded());
    }

    #[tokio::test]
    async fn test_cancel_wins_over_late_finish() {
        let op = Operation::new("fetch", async { Ok(()) });
        let handle = op.handle();

        assert!(handle.transition_running());
        assert!(handle.cancel());
        assert!(!handle.finish(Ok(())));
        assert!(handle.state().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_before_running_blocks_start() {
        let op = Operation::new("fetch", async { Ok(()) });
        let handle = op.handle();

        handle.cancel();
        assert!(!handle.transition_running());
        assert!(handle.state().is_cancelled());
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_state() {
        let op = Operation::new("fetch", async { Ok(()) });
        let handle = op.handle();

        let waiter = tokio::spawn({
            let handle = handle.clone();
            async move { handle.wait().await }
        });

        handle.transition_running();
        handle.finish(Ok(()));

        let state = waiter.await.unwrap();
        assert!(state.is_succeeded());
    }

    #[tokio::test]
    async fn test_wait_on_already_terminal_returns_immediately() {
        let op = Operation::new("fetch", async { Ok(()) });
        let handle = op.handle();
        handle.cancel();
        assert!(handle.wait().await.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_hook_runs_once() {
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let op = Operation::new("fetch", async { Ok(()) }).on_cancel({
            let count = count.clone();
            move || {
                count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        });
        let handle = op.handle();

        handle.cancel();
        handle.cancel();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_observable_from_all_handles() {
        let op = Operation::new("fetch", async { Ok(()) });
        let a = op.handle();
        let b = op.handle();

        a.transition_running();
        a.finish(Err(OperationError::from(ApiError::HttpStatus(500))));

        assert!(a.state().failure().is_some());
        assert!(b.state().failure().is_some());
    }
}
