//! The cooperative host loop.

use super::handle::LoopHandle;
use super::state::{HandleId, LoopShared, Slot, Teardown, WakeCallback};
use super::RunLoopError;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Why [`RunLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Nothing was pending and no handle was referenced.
    Idle,
    /// [`LoopHandle::stop`] was called.
    Stopped,
}

/// Outcome of a single loop turn.
enum Turn {
    Exit(ExitReason),
    Worked,
    Wait,
}

/// Single-threaded cooperative loop.
///
/// Wake handles registered through a [`LoopHandle`] have their callbacks
/// executed here, one at a time, on whichever task drives [`run`](Self::run).
/// Callbacks are always invoked with the loop lock released, so they may
/// freely wake, register or close handles.
pub struct RunLoop {
    shared: Arc<LoopShared>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(LoopShared::new()),
        }
    }

    /// Returns a handle for registering callbacks from any thread.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Runs the loop until it becomes idle or is stopped.
    ///
    /// The loop is idle once no callback is pending, no handle is being
    /// closed and no handle is referenced.
    ///
    /// # Errors
    ///
    /// Returns [`RunLoopError::AlreadyRunning`] if another task is already
    /// driving this loop.
    pub async fn run(&self) -> Result<ExitReason, RunLoopError> {
        {
            let mut state = self.shared.state.lock();
            if state.running {
                return Err(RunLoopError::AlreadyRunning);
            }
            state.running = true;
        }
        let _running = RunningGuard(&self.shared);
        debug!("Run loop started");

        loop {
            match self.turn() {
                Turn::Exit(reason) => {
                    debug!(reason = ?reason, "Run loop exiting");
                    return Ok(reason);
                }
                // Give other tasks on this thread a chance between turns.
                Turn::Worked => tokio::task::yield_now().await,
                Turn::Wait => self.shared.wakeup.notified().await,
            }
        }
    }

    fn turn(&self) -> Turn {
        let (ready, closing, stop) = {
            let mut state = self.shared.state.lock();
            let stop = std::mem::take(&mut state.stop_requested);
            if !stop && state.ready.is_empty() && state.closing.is_empty() {
                return if state.has_referenced() {
                    Turn::Wait
                } else {
                    Turn::Exit(ExitReason::Idle)
                };
            }
            (
                std::mem::take(&mut state.ready),
                std::mem::take(&mut state.closing),
                stop,
            )
        };

        for id in ready {
            self.dispatch(id);
        }
        for id in closing {
            self.detach(id);
        }
        if stop {
            Turn::Exit(ExitReason::Stopped)
        } else {
            Turn::Worked
        }
    }

    /// Runs one handle's callback.
    fn dispatch(&self, id: HandleId) {
        let callback = {
            let mut state = self.shared.state.lock();
            match state.slots.get_mut(&id) {
                Some(slot) if !slot.closing => {
                    slot.woken = false;
                    slot.callback.take()
                }
                _ => None,
            }
        };
        let Some(mut callback) = callback else {
            return;
        };

        callback();

        // Put the callback back. If the slot vanished meanwhile, drop the
        // callback outside the lock since its destructor may touch the loop.
        let leftover: Option<WakeCallback> = {
            let mut state = self.shared.state.lock();
            match state.slots.get_mut(&id) {
                Some(slot) if slot.callback.is_none() => {
                    slot.callback = Some(callback);
                    None
                }
                _ => Some(callback),
            }
        };
        drop(leftover);
    }

    /// Removes a closed handle and runs its teardown continuations.
    fn detach(&self, id: HandleId) {
        let slot = self.shared.state.lock().slots.remove(&id);
        if let Some(slot) = slot {
            trace!(handle = id, "Detached wake handle");
            finish(slot);
        }
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        let slots: Vec<Slot> = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.ready.clear();
            state.closing.clear();
            state.slots.drain().map(|(_, slot)| slot).collect()
        };
        // Every handle is detached now that the loop is gone.
        for slot in slots {
            finish(slot);
        }
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop").finish_non_exhaustive()
    }
}

fn finish(slot: Slot) {
    let Slot {
        callback, teardown, ..
    } = slot;
    drop(callback);
    teardown.into_iter().for_each(|continuation: Teardown| continuation());
}

struct RunningGuard<'a>(&'a LoopShared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    const LIMIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_run_with_no_handles_is_idle() {
        let run_loop = RunLoop::new();
        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        assert_eq!(reason, ExitReason::Idle);
    }

    #[tokio::test]
    async fn test_wake_invokes_callback_once_per_turn() {
        let run_loop = RunLoop::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = {
            let count = Arc::clone(&count);
            run_loop
                .handle()
                .register(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };

        // Coalesced into a single invocation.
        assert!(handle.wake());
        assert!(handle.wake());
        assert!(handle.wake());

        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        assert_eq!(reason, ExitReason::Idle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreferenced_handle_does_not_keep_loop_alive() {
        let run_loop = RunLoop::new();
        let handle = run_loop.handle().register(|| {}).unwrap();
        assert!(!handle.is_referenced());

        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        assert_eq!(reason, ExitReason::Idle);
    }

    #[tokio::test]
    async fn test_referenced_handle_keeps_loop_alive_until_unref() {
        let run_loop = RunLoop::new();
        let loop_handle = run_loop.handle();
        let count = Arc::new(AtomicUsize::new(0));

        let wake = {
            let count = Arc::clone(&count);
            Arc::new(
                loop_handle
                    .register(move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap(),
            )
        };
        wake.set_referenced(true);
        assert_eq!(loop_handle.referenced_count(), 1);

        let remote = Arc::clone(&wake);
        let worker = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.wake();
            std::thread::sleep(Duration::from_millis(20));
            remote.set_referenced(false);
        });

        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        worker.join().unwrap();

        assert_eq!(reason, ExitReason::Idle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_returns_stopped() {
        let run_loop = RunLoop::new();
        let handle = run_loop.handle().register(|| {}).unwrap();
        handle.set_referenced(true);

        run_loop.handle().stop();
        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        assert_eq!(reason, ExitReason::Stopped);
    }

    #[tokio::test]
    async fn test_stop_finishes_pending_work_first() {
        let run_loop = RunLoop::new();
        let count = Arc::new(AtomicUsize::new(0));
        let handle = {
            let count = Arc::clone(&count);
            run_loop
                .handle()
                .register(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap()
        };
        handle.set_referenced(true);
        handle.wake();

        run_loop.handle().stop();
        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        assert_eq!(reason, ExitReason::Stopped);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_confirms_detachment_on_loop() {
        let run_loop = RunLoop::new();
        let handle = run_loop.handle().register(|| {}).unwrap();
        handle.set_referenced(true);

        let mut detached = handle.close();
        assert!(!detached.is_complete());
        assert_eq!(run_loop.handle().handle_count(), 1);

        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        assert_eq!(reason, ExitReason::Idle);
        assert!(detached.is_complete());
        assert!(detached.is_complete());
        assert_eq!(run_loop.handle().handle_count(), 0);
        std::thread::spawn(move || detached.wait()).join().unwrap();
    }

    #[tokio::test]
    async fn test_wake_after_close_is_rejected() {
        let run_loop = RunLoop::new();
        let handle = run_loop.handle().register(|| {}).unwrap();
        // Ids are handed out sequentially from zero.
        let id: HandleId = 0;

        drop(handle.close());
        assert!(!run_loop.shared.wake(id));
        assert!(run_loop.shared.state.lock().slots[&id].closing);
    }

    #[tokio::test]
    async fn test_callback_can_close_itself() {
        let run_loop = RunLoop::new();
        let slot: Arc<parking_lot::Mutex<Option<crate::runloop::WakeHandle>>> =
            Arc::new(parking_lot::Mutex::new(None));

        let handle = {
            let slot = Arc::clone(&slot);
            run_loop
                .handle()
                .register(move || {
                    if let Some(handle) = slot.lock().take() {
                        drop(handle.close());
                    }
                })
                .unwrap()
        };
        handle.set_referenced(true);
        handle.wake();
        *slot.lock() = Some(handle);

        let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        assert_eq!(reason, ExitReason::Idle);
        assert_eq!(run_loop.handle().handle_count(), 0);
    }

    #[tokio::test]
    async fn test_register_after_drop_fails() {
        let run_loop = RunLoop::new();
        let handle = run_loop.handle();
        drop(run_loop);

        assert!(matches!(handle.register(|| {}), Err(RunLoopError::Closed)));
    }

    #[tokio::test]
    async fn test_dropping_loop_completes_pending_detach() {
        let run_loop = RunLoop::new();
        let handle = run_loop.handle().register(|| {}).unwrap();
        let detached = handle.close();
        drop(run_loop);

        timeout(LIMIT, detached).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_run_is_rejected() {
        let run_loop = Arc::new(RunLoop::new());
        let handle = run_loop.handle().register(|| {}).unwrap();
        handle.set_referenced(true);

        let background = {
            let run_loop = Arc::clone(&run_loop);
            tokio::spawn(async move { run_loop.run().await })
        };
        while !run_loop.handle().is_running() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            run_loop.run().await,
            Err(RunLoopError::AlreadyRunning)
        ));

        run_loop.handle().stop();
        let reason = timeout(LIMIT, background).await.unwrap().unwrap().unwrap();
        assert_eq!(reason, ExitReason::Stopped);
    }
}
