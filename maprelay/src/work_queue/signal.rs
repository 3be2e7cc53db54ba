//! One-shot completion hand-off that holds the loop open while armed.

use super::queue::WorkQueue;
use super::WorkQueueError;
use crate::runloop::{Detached, LoopHandle, RunLoopError};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Delivers a result from a background job to the loop and lets the loop
/// exit afterwards.
///
/// Call [`arm`](Self::arm) when the job starts: the loop stays alive from
/// then on. When a worker calls [`complete`](Self::complete), the loop
/// releases its reference and invokes the completion callback with the
/// value. A signal can be armed again for the next job.
pub struct CompletionSignal<T: Send + 'static> {
    queue: WorkQueue<T>,
}

impl<T: Send + 'static> CompletionSignal<T> {
    /// # Errors
    ///
    /// Returns [`RunLoopError::Closed`] if the loop has been dropped.
    pub fn new<F>(handle: &LoopHandle, on_complete: F) -> Result<Self, RunLoopError>
    where
        F: FnMut(T) + Send + 'static,
    {
        let this = Arc::new(OnceLock::new());
        let slot = Arc::clone(&this);
        let mut on_complete = on_complete;

        let queue = WorkQueue::new(handle, move |value| {
            // Unref first so a callback that re-arms keeps the loop alive.
            if let Some(queue) = slot.get().and_then(super::queue::WeakWorkQueue::upgrade) {
                queue.unref_loop();
            }
            trace!("Completion signal fired");
            on_complete(value);
        })?;
        let _ = this.set(queue.downgrade());

        Ok(Self { queue })
    }

    /// Keeps the loop alive until the next completion is delivered.
    pub fn arm(&self) {
        self.queue.ref_loop();
    }

    pub fn is_armed(&self) -> bool {
        self.queue.is_referenced()
    }

    /// Hands `value` to the loop. Callable from any thread.
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError::Stopped`] if the signal has been stopped.
    pub fn complete(&self, value: T) -> Result<(), WorkQueueError<T>> {
        self.queue.send(value)
    }

    /// Tears the signal down; see [`WorkQueue::stop`].
    pub fn stop(&self) -> Detached {
        self.queue.stop()
    }
}

impl<T: Send + 'static> Clone for CompletionSignal<T> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for CompletionSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("armed", &self.is_armed())
            .field("state", &self.queue.state())
            .finish()
    }
}
