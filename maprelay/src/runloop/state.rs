//! Shared loop state guarded by a single lock.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Notify;

pub(crate) type HandleId = u64;

/// Callback invoked on the loop thread when a handle is woken.
pub(crate) type WakeCallback = Box<dyn FnMut() + Send + 'static>;

/// Continuation invoked on the loop thread once a handle is detached.
pub(crate) type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Per-handle bookkeeping.
pub(crate) struct Slot {
    /// `None` while the callback is executing on the loop thread.
    pub(crate) callback: Option<WakeCallback>,
    pub(crate) referenced: bool,
    /// Set by `wake()`, cleared right before the callback runs.
    pub(crate) woken: bool,
    pub(crate) closing: bool,
    pub(crate) teardown: Vec<Teardown>,
}

#[derive(Default)]
pub(crate) struct LoopState {
    pub(crate) next_id: HandleId,
    pub(crate) slots: HashMap<HandleId, Slot>,
    pub(crate) ready: VecDeque<HandleId>,
    pub(crate) closing: VecDeque<HandleId>,
    pub(crate) stop_requested: bool,
    pub(crate) running: bool,
    /// Set once the owning `RunLoop` is dropped.
    pub(crate) closed: bool,
}

impl LoopState {
    pub(crate) fn has_referenced(&self) -> bool {
        self.slots.values().any(|slot| slot.referenced && !slot.closing)
    }
}

pub(crate) struct LoopShared {
    pub(crate) state: Mutex<LoopState>,
    pub(crate) wakeup: Notify,
}

impl LoopShared {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LoopState::default()),
            wakeup: Notify::new(),
        }
    }

    /// Marks a handle as ready and wakes the loop.
    ///
    /// Wakes are coalesced: a handle that is already queued is not queued
    /// again. Returns false if the handle is closing or gone.
    pub(crate) fn wake(&self, id: HandleId) -> bool {
        {
            let mut state = self.state.lock();
            let Some(slot) = state.slots.get_mut(&id) else {
                return false;
            };
            if slot.closing {
                return false;
            }
            if !slot.woken {
                slot.woken = true;
                state.ready.push_back(id);
            }
        }
        self.wakeup.notify_one();
        true
    }

    /// Begins closing a handle; the loop detaches it on its next turn.
    pub(crate) fn begin_close(&self, id: HandleId, teardown: Option<Teardown>) {
        let orphaned = {
            let mut state = self.state.lock();
            match state.slots.get_mut(&id) {
                Some(slot) => {
                    if let Some(teardown) = teardown {
                        slot.teardown.push(teardown);
                    }
                    if !slot.closing {
                        slot.closing = true;
                        slot.referenced = false;
                        state.closing.push_back(id);
                    }
                    None
                }
                // The loop is gone; nobody else will run the continuation.
                None => teardown,
            }
        };
        match orphaned {
            Some(teardown) => teardown(),
            None => self.wakeup.notify_one(),
        }
    }
}
