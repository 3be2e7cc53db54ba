//! Thread-safe deferred-call queue onto the host loop.

use super::{QueueState, WorkQueueError};
use crate::runloop::{Detached, LoopHandle, RunLoopError, WakeHandle};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct Inner<T> {
    pending: Vec<T>,
    state: QueueState,
    stop_waiters: Vec<oneshot::Sender<()>>,
}

struct QueueShared<T> {
    inner: Mutex<Inner<T>>,
    /// `None` once `stop()` has handed the handle to the loop for closing.
    wake: Mutex<Option<WakeHandle>>,
}

impl<T> QueueShared<T> {
    /// Drains the backlog captured at this instant into `callback`.
    fn process(&self, callback: &mut dyn FnMut(T)) {
        let batch = {
            let mut inner = self.inner.lock();
            if inner.state != QueueState::Running {
                return;
            }
            std::mem::take(&mut inner.pending)
        };
        for item in batch {
            callback(item);
        }
    }

    /// Second phase of teardown, run on the loop once the handle is detached.
    fn finish_stop(&self) {
        let (discarded, waiters) = {
            let mut inner = self.inner.lock();
            inner.state = QueueState::Stopped;
            let discarded = std::mem::take(&mut inner.pending);
            (discarded, std::mem::take(&mut inner.stop_waiters))
        };
        if !discarded.is_empty() {
            debug!(
                discarded = discarded.len(),
                "Work queue stopped with unprocessed items"
            );
        }
        drop(discarded);
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}

/// Sends values from any thread to a callback running on the host loop.
///
/// Cloning a `WorkQueue` yields another sender for the same queue. The
/// callback runs once per item, on the loop, in the order the items were
/// captured by each drain.
///
/// # Example
///
/// ```
/// use maprelay::runloop::RunLoop;
/// use maprelay::work_queue::WorkQueue;
/// use std::sync::{Arc, Mutex};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let run_loop = RunLoop::new();
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let queue = WorkQueue::new(&run_loop.handle(), move |n: u32| {
///     sink.lock().unwrap().push(n);
/// })
/// .unwrap();
///
/// let sender = queue.clone();
/// std::thread::spawn(move || sender.send(7).unwrap()).join().unwrap();
///
/// run_loop.run().await.unwrap();
/// assert_eq!(*seen.lock().unwrap(), vec![7]);
/// # });
/// ```
pub struct WorkQueue<T: Send + 'static> {
    shared: Arc<QueueShared<T>>,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Creates a queue whose items are handed to `callback` on the loop.
    ///
    /// The queue starts unreferenced.
    ///
    /// # Errors
    ///
    /// Returns [`RunLoopError::Closed`] if the loop has been dropped.
    pub fn new<F>(handle: &LoopHandle, callback: F) -> Result<Self, RunLoopError>
    where
        F: FnMut(T) + Send + 'static,
    {
        let shared = Arc::new(QueueShared {
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                state: QueueState::Running,
                stop_waiters: Vec::new(),
            }),
            wake: Mutex::new(None),
        });

        let weak = Arc::downgrade(&shared);
        let mut callback = callback;
        let wake = handle.register(move || {
            if let Some(shared) = weak.upgrade() {
                shared.process(&mut callback);
            }
        })?;
        *shared.wake.lock() = Some(wake);

        Ok(Self { shared })
    }

    /// Appends `item` and wakes the loop.
    ///
    /// Never blocks beyond the internal lock.
    ///
    /// # Errors
    ///
    /// Returns [`WorkQueueError::Stopped`] with the item if `stop()` has
    /// already begun.
    pub fn send(&self, item: T) -> Result<(), WorkQueueError<T>> {
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != QueueState::Running {
                warn!(state = %inner.state, "Rejected send on stopped work queue");
                return Err(WorkQueueError::Stopped(item));
            }
            inner.pending.push(item);
        }
        if let Some(wake) = self.shared.wake.lock().as_ref() {
            if !wake.wake() {
                warn!("Work queue item accepted but the run loop is gone");
            }
        }
        Ok(())
    }

    /// Keeps the host loop alive while this queue exists.
    pub fn ref_loop(&self) {
        if let Some(wake) = self.shared.wake.lock().as_ref() {
            wake.set_referenced(true);
        }
    }

    /// Lets the host loop exit even though this queue exists.
    pub fn unref_loop(&self) {
        if let Some(wake) = self.shared.wake.lock().as_ref() {
            wake.set_referenced(false);
        }
    }

    pub fn is_referenced(&self) -> bool {
        self.shared
            .wake
            .lock()
            .as_ref()
            .is_some_and(WakeHandle::is_referenced)
    }

    /// Number of items waiting for the next drain.
    pub fn pending_len(&self) -> usize {
        self.shared.inner.lock().pending.len()
    }

    pub fn state(&self) -> QueueState {
        self.shared.inner.lock().state
    }

    /// Begins asynchronous teardown.
    ///
    /// The queue moves to [`QueueState::Stopping`] immediately and rejects
    /// further sends. The loop then detaches the wake handle, drops the
    /// callback and moves the queue to [`QueueState::Stopped`]; the returned
    /// [`Detached`] completes at that point. Items still pending are
    /// discarded. Calling `stop()` again returns another future for the
    /// same teardown.
    pub fn stop(&self) -> Detached {
        let (tx, rx) = oneshot::channel();
        let handle = {
            let mut inner = self.shared.inner.lock();
            if inner.state == QueueState::Stopped {
                let _ = tx.send(());
                return Detached::from_receiver(rx);
            }
            inner.state = QueueState::Stopping;
            inner.stop_waiters.push(tx);
            self.shared.wake.lock().take()
        };

        if let Some(handle) = handle {
            // The continuation owns the queue state until the loop is done
            // with it.
            let owned = Arc::clone(&self.shared);
            handle.close_then(move || owned.finish_stop());
        }
        Detached::from_receiver(rx)
    }

    pub(crate) fn downgrade(&self) -> WeakWorkQueue<T> {
        WeakWorkQueue {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<T: Send + 'static> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send + 'static> fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkQueue")
            .field("state", &self.state())
            .field("pending", &self.pending_len())
            .finish()
    }
}

/// Non-owning reference to a [`WorkQueue`].
pub(crate) struct WeakWorkQueue<T: Send + 'static> {
    shared: Weak<QueueShared<T>>,
}

impl<T: Send + 'static> WeakWorkQueue<T> {
    pub(crate) fn upgrade(&self) -> Option<WorkQueue<T>> {
        self.shared.upgrade().map(|shared| WorkQueue { shared })
    }
}
