//! Composable asynchronous sync operations.
//!
//! A sync cycle is a handful of dependent network calls. Each call is
//! wrapped in an [`Operation`] with lifecycle state and a dependency list,
//! submitted to an [`OperationQueue`] running on a bounded worker pool, and
//! optionally grouped under a [`CompoundOperation`] so outer orchestration
//! can treat a multi-step fetch as one cancellable unit.
//!
//! This is not a general task scheduler: no priorities, no retry, no
//! persistence. Just dependency chaining, bounded concurrency, and
//! cooperative cancellation for an in-process sync cycle.

mod compound;
mod operation;
mod queue;

pub use compound::CompoundOperation;
pub use operation::{Operation, OperationError, OperationHandle, OperationState};
pub use queue::{OperationQueue, DEFAULT_MAX_CONCURRENT};
