//! Cross-thread work queues onto the host loop.
//!
//! A [`WorkQueue`] lets any thread hand values to a callback that runs on the
//! [`RunLoop`](crate::runloop::RunLoop). Sends append under a lock and wake
//! the loop; the loop swaps the whole backlog out and processes it with the
//! lock released, so items sent while a batch is running wait for the next
//! turn.
//!
//! [`CompletionSignal`] is a single-purpose queue that keeps the loop alive
//! while a background job is outstanding and lets it go once the result has
//! been delivered.

mod queue;
mod signal;

pub(crate) use queue::WeakWorkQueue;
pub use queue::WorkQueue;
pub use signal::CompletionSignal;

use std::fmt;
use thiserror::Error;

/// Lifecycle of a [`WorkQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// Accepting and delivering items.
    Running,
    /// `stop()` was called; waiting for the loop to detach the handle.
    Stopping,
    /// Detached. The callback has been dropped.
    Stopped,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueState::Running => write!(f, "running"),
            QueueState::Stopping => write!(f, "stopping"),
            QueueState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Errors from sending to a [`WorkQueue`].
#[derive(Error)]
pub enum WorkQueueError<T> {
    /// The queue is stopping or stopped. Carries the rejected item back.
    #[error("work queue is stopped")]
    Stopped(T),
}

impl<T> WorkQueueError<T> {
    /// Recovers the item that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            WorkQueueError::Stopped(item) => item,
        }
    }
}

impl<T> fmt::Debug for WorkQueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkQueueError::Stopped(_) => f.write_str("Stopped(..)"),
        }
    }
}
