//! An operation that owns a private queue of child operations.
//!
//! Outer orchestration sees a compound as a single unit of work: it
//! finishes only when a synthetic terminal child, dependent on every
//! declared child, has run, and cancelling it cancels the entire nested
//! queue. This lets a multi-step fetch ("get tags, then taggings, then
//! entries") be sequenced without the outer queue knowing the inner graph.

use crate::sync::operation::{Operation, OperationHandle, OperationState};
use crate::sync::queue::OperationQueue;

/// A fixed set of child operations behind a single operation facade.
pub struct CompoundOperation {
    name: String,
    children: Vec<Operation>,
}

impl CompoundOperation {
    /// The child set is fixed at construction and should be non-empty; an
    /// empty compound completes immediately with success.
    pub fn new(name: impl Into<String>, children: Vec<Operation>) -> Self {
        let name = name.into();
        if children.is_empty() {
            tracing::warn!(compound = %name, "Compound operation built with no children");
        }
        Self { name, children }
    }

    /// Handles of the declared children, in declaration order.
    pub fn child_handles(&self) -> Vec<OperationHandle> {
        self.children.iter().map(Operation::handle).collect()
    }

    /// Convert into a plain [`Operation`] suitable for an outer queue.
    ///
    /// Running it submits every child plus the terminal sentinel to a fresh
    /// nested queue and waits for the sentinel. The first declared child
    /// that failed becomes the compound's failure; siblings are never
    /// interrupted by a sibling's failure. Cancelling the returned
    /// operation cascades into the nested queue, so every child ends
    /// cancelled, and the compound itself reports cancelled rather than
    /// failed.
    pub fn into_operation(self) -> Operation {
        let CompoundOperation { name, children } = self;

        let nested = OperationQueue::default();
        let child_handles: Vec<OperationHandle> =
            children.iter().map(Operation::handle).collect();

        let terminal = Operation::new(format!("{name}:terminal"), async { Ok(()) })
            .with_dependencies(child_handles.clone());
        let terminal_handle = terminal.handle();

        // Cancel by handle rather than through the nested queue: if the
        // compound is cancelled before it ever runs, the children were
        // never submitted, but their handles already exist.
        let cancel_handles: Vec<OperationHandle> = child_handles
            .iter()
            .cloned()
            .chain([terminal_handle.clone()])
            .collect();
        let compound_name = name.clone();

        Operation::new(name, async move {
            for child in children {
                nested.add(child);
            }
            nested.add(terminal);

            let terminal_state = terminal_handle.wait().await;

            let first_failure = child_handles
                .iter()
                .find_map(|child| child.state().failure().cloned());

            if let Some(failure) = first_failure {
                tracing::warn!(
                    compound = %compound_name,
                    error = %failure,
                    "Compound operation finished with a child failure"
                );
                return Err(failure);
            }

            match terminal_state {
                OperationState::Cancelled => {
                    // Nested queue cancelled: the cascade has already moved
                    // our own handle to Cancelled. Park so the outer queue
                    // observes that and drops this future instead of letting
                    // a cancelled compound report success.
                    futures::future::pending::<()>().await;
                    Ok(())
                }
                _ => Ok(()),
            }
        })
        .on_cancel(move || {
            for handle in &cancel_handles {
                handle.cancel();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::operation::OperationError;
    use crate::transport::ApiError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_compound_finishes_after_all_children() {
        let completed = Arc::new(AtomicUsize::new(0));
        let children: Vec<Operation> = (0..5)
            .map(|i| {
                let completed = completed.clone();
                Operation::new(format!("child-{i}"), async move {
                    tokio::time::sleep(Duration::from_millis(10 * (i + 1))).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .collect();

        let compound = CompoundOperation::new("fetch-all", children).into_operation();
        let handle = compound.handle();

        let queue = OperationQueue::default();
        queue.add(compound);

        assert!(handle.wait().await.is_succeeded());
        assert_eq!(completed.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_first_child_failure_propagates() {
        let children = vec![
            Operation::new("ok", async { Ok(()) }),
            Operation::new("fails", async {
                Err(OperationError::from(ApiError::HttpStatus(500)))
            }),
            Operation::new("also-ok", async { Ok(()) }),
        ];

        let compound = CompoundOperation::new("sync", children).into_operation();
        let handle = compound.handle();

        let queue = OperationQueue::default();
        queue.add(compound);

        let state = handle.wait().await;
        let failure = state.failure().expect("compound should report the child failure");
        assert!(matches!(*failure.0, ApiError::HttpStatus(500)));
    }

    #[tokio::test]
    async fn test_sibling_failure_does_not_stop_others() {
        let completed = Arc::new(AtomicUsize::new(0));
        let children = vec![
            Operation::new("fails-fast", async {
                Err(OperationError::from(ApiError::NoData))
            }),
            Operation::new("slow-sibling", {
                let completed = completed.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        ];

        let compound = CompoundOperation::new("sync", children).into_operation();
        let handle = compound.handle();

        let queue = OperationQueue::default();
        queue.add(compound);

        let state = handle.wait().await;
        assert!(state.failure().is_some());
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_cascades_to_all_children() {
        let children: Vec<Operation> = (0..4)
            .map(|i| {
                Operation::new(format!("child-{i}"), async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })
            })
            .collect();

        let compound = CompoundOperation::new("sync", children);
        let child_handles = compound.child_handles();
        let operation = compound.into_operation();
        let handle = operation.handle();

        let queue = OperationQueue::default();
        queue.add(operation);
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.cancel();

        let state = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("cancel should resolve the compound promptly");
        assert!(state.is_cancelled());

        for child in child_handles {
            assert!(
                child.wait().await.is_cancelled(),
                "every child should be cancelled"
            );
        }
    }

    #[tokio::test]
    async fn test_cancel_before_start_still_cancels_children() {
        let compound = CompoundOperation::new(
            "never-runs",
            vec![Operation::new("child", async { Ok(()) })],
        );
        let child_handles = compound.child_handles();
        let operation = compound.into_operation();
        let handle = operation.handle();

        // Cancel before the operation is ever submitted to a queue
        handle.cancel();

        assert!(handle.state().is_cancelled());
        for child in child_handles {
            assert!(child.state().is_cancelled());
        }
    }

    #[tokio::test]
    async fn test_children_run_concurrently_without_dependencies() {
        // Two children that each wait for the other's side effect would
        // deadlock if the nested queue serialized them strictly.
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let children = vec![
            Operation::new("signaller", async move {
                let _ = tx.send(());
                Ok(())
            }),
            Operation::new("waiter", async move {
                rx.await.map_err(|_| OperationError::from(ApiError::NoData))?;
                Ok(())
            }),
        ];

        let compound = CompoundOperation::new("pair", children).into_operation();
        let handle = compound.handle();
        let queue = OperationQueue::default();
        queue.add(compound);

        let state = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("children should run concurrently");
        assert!(state.is_succeeded());
    }

    #[tokio::test]
    async fn test_compound_with_internal_dependency_chain() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let first = Operation::new("collections", {
            let order = order.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                order.lock().unwrap().push("collections");
                Ok(())
            }
        });
        let first_handle = first.handle();

        let second = Operation::new("streams", {
            let order = order.clone();
            async move {
                order.lock().unwrap().push("streams");
                Ok(())
            }
        })
        .with_dependencies([first_handle]);

        let compound = CompoundOperation::new("chained-fetch", vec![first, second]).into_operation();
        let handle = compound.handle();
        let queue = OperationQueue::default();
        queue.add(compound);

        assert!(handle.wait().await.is_succeeded());
        assert_eq!(*order.lock().unwrap(), vec!["collections", "streams"]);
    }
}
