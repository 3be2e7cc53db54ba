//! Handles onto a running loop.

use super::state::{HandleId, LoopShared, Slot};
use super::RunLoopError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::trace;

/// Cloneable, thread-safe handle to a [`RunLoop`](super::RunLoop).
///
/// Used to register wake handles and to ask the loop to stop. Holding a
/// `LoopHandle` does not keep the loop running.
#[derive(Clone)]
pub struct LoopHandle {
    pub(crate) shared: Arc<LoopShared>,
}

impl LoopHandle {
    /// Registers a callback that runs on the loop thread whenever the
    /// returned [`WakeHandle`] is woken.
    ///
    /// New handles start unreferenced: they do not keep the loop alive
    /// until [`WakeHandle::set_referenced`] is called.
    ///
    /// # Errors
    ///
    /// Returns [`RunLoopError::Closed`] if the loop has been dropped.
    pub fn register<F>(&self, callback: F) -> Result<WakeHandle, RunLoopError>
    where
        F: FnMut() + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.closed {
            return Err(RunLoopError::Closed);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.slots.insert(
            id,
            Slot {
                callback: Some(Box::new(callback)),
                referenced: false,
                woken: false,
                closing: false,
                teardown: Vec::new(),
            },
        );
        trace!(handle = id, "Registered wake handle");
        Ok(WakeHandle {
            id,
            shared: Arc::clone(&self.shared),
            closed: false,
        })
    }

    /// Asks the loop to return from `run()` at the end of its next turn.
    ///
    /// Work that is already pending when that turn starts is still
    /// processed; anything woken during the turn waits for the next `run()`.
    pub fn stop(&self) {
        self.shared.state.lock().stop_requested = true;
        self.shared.wakeup.notify_one();
    }

    /// Returns true while `run()` is executing.
    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// Number of registered handles, including ones that are closing.
    pub fn handle_count(&self) -> usize {
        self.shared.state.lock().slots.len()
    }

    /// Number of handles currently keeping the loop alive.
    pub fn referenced_count(&self) -> usize {
        let state = self.shared.state.lock();
        state
            .slots
            .values()
            .filter(|slot| slot.referenced && !slot.closing)
            .count()
    }
}

impl fmt::Debug for LoopHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopHandle")
            .field("handles", &self.handle_count())
            .field("running", &self.is_running())
            .finish()
    }
}

/// A registered callback on the loop, woken from any thread.
///
/// Dropping the handle closes it.
pub struct WakeHandle {
    id: HandleId,
    shared: Arc<LoopShared>,
    closed: bool,
}

impl WakeHandle {
    /// Schedules the callback to run on the loop thread.
    ///
    /// Multiple wakes before the callback runs result in a single
    /// invocation. Returns false if the handle is closing or the loop has
    /// been dropped.
    pub fn wake(&self) -> bool {
        self.shared.wake(self.id)
    }

    /// Controls whether this handle alone keeps `run()` from returning.
    pub fn set_referenced(&self, referenced: bool) {
        let mut state = self.shared.state.lock();
        if let Some(slot) = state.slots.get_mut(&self.id) {
            if !slot.closing {
                slot.referenced = referenced;
            }
        }
        drop(state);
        // An unref may make the loop eligible to exit.
        self.shared.wakeup.notify_one();
    }

    pub fn is_referenced(&self) -> bool {
        let state = self.shared.state.lock();
        state
            .slots
            .get(&self.id)
            .is_some_and(|slot| slot.referenced && !slot.closing)
    }

    /// Closes the handle and returns a future that completes once the loop
    /// has detached it.
    pub fn close(self) -> Detached {
        let (tx, rx) = oneshot::channel();
        self.close_then(move || {
            let _ = tx.send(());
        });
        Detached::from_receiver(rx)
    }

    /// Closes the handle and runs `teardown` on the loop thread once it has
    /// been detached.
    ///
    /// The callback registered with the handle is dropped before `teardown`
    /// runs. If the loop no longer exists, `teardown` runs immediately.
    pub fn close_then<F>(mut self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.closed = true;
        self.shared.begin_close(self.id, Some(Box::new(teardown)));
    }
}

impl Drop for WakeHandle {
    fn drop(&mut self) {
        if !self.closed {
            self.shared.begin_close(self.id, None);
        }
    }
}

impl fmt::Debug for WakeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeHandle")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Completes once the loop confirms a closed handle is fully detached.
///
/// Also completes if the loop is dropped before it gets there.
#[derive(Debug)]
pub struct Detached {
    rx: oneshot::Receiver<()>,
    /// The receiver has yielded; it must not be polled again.
    done: bool,
}

impl Detached {
    pub(crate) fn from_receiver(rx: oneshot::Receiver<()>) -> Self {
        Self { rx, done: false }
    }

    /// Blocks the current thread until detachment is confirmed.
    ///
    /// Must not be called from the loop thread or from inside an async
    /// context; use `.await` there instead.
    pub fn wait(self) {
        if !self.done {
            let _ = self.rx.blocking_recv();
        }
    }

    /// Returns true if detachment has already been confirmed.
    pub fn is_complete(&mut self) -> bool {
        if !self.done {
            self.done = !matches!(
                self.rx.try_recv(),
                Err(oneshot::error::TryRecvError::Empty)
            );
        }
        self.done
    }
}

impl Future for Detached {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.done {
            return Poll::Ready(());
        }
        let ready = Pin::new(&mut self.rx).poll(cx).is_ready();
        if ready {
            self.done = true;
            Poll::Ready(())
        } else {
            Poll::Pending
        }
    }
}
