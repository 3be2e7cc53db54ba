//! Per-actor message queue with single-drain delivery.

use super::{Message, Scheduler};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tracing::{trace, warn};

/// Whether a mailbox is currently being drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    Idle,
    Draining,
}

struct MailboxState {
    queue: VecDeque<Message>,
    draining: bool,
    closed: bool,
    /// Accepts messages but does not deliver them until opened.
    paused: bool,
    /// Thread running the active drain, used to detect self-destruction.
    drain_thread: Option<ThreadId>,
}

/// Ordered queue of messages for one actor.
///
/// The mailbox is owned by its actor. Senders and schedulers only ever hold
/// a [`Weak`] reference and re-validate it right before delivery, so a
/// message is never run after the actor has been destroyed.
///
/// At most one drain runs at a time. A drain started while another is in
/// progress returns immediately; the active drain keeps going until the
/// queue is empty and so picks up anything enqueued in the meantime.
///
/// A mailbox created with [`Mailbox::paused`] queues messages without
/// running them until [`open`](Mailbox::open) is called.
pub struct Mailbox {
    state: Mutex<MailboxState>,
    /// Held for the duration of each message so `close()` can wait for it.
    receiving: Mutex<()>,
    scheduler: Arc<dyn Scheduler>,
}

impl Mailbox {
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_state(scheduler, false)
    }

    /// A mailbox that holds messages until [`open`](Self::open).
    pub fn paused(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::with_state(scheduler, true)
    }

    fn with_state(scheduler: Arc<dyn Scheduler>, paused: bool) -> Self {
        Self {
            state: Mutex::new(MailboxState {
                queue: VecDeque::new(),
                draining: false,
                closed: false,
                paused,
                drain_thread: None,
            }),
            receiving: Mutex::new(()),
            scheduler,
        }
    }

    /// Starts delivery on a paused mailbox, scheduling a drain for anything
    /// queued while it was paused.
    pub fn open(self: &Arc<Self>) {
        let backlog = {
            let mut state = self.state.lock();
            if !state.paused {
                return;
            }
            state.paused = false;
            !state.closed && !state.queue.is_empty()
        };
        if backlog {
            if let Err(e) = self.scheduler.schedule(Arc::downgrade(self)) {
                warn!(error = %e, "Failed to schedule mailbox drain");
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    /// Appends a message without triggering delivery.
    ///
    /// Returns false, dropping the message, if the mailbox is closed.
    pub fn enqueue(&self, message: Message) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }
        state.queue.push_back(message);
        true
    }

    /// Enqueues a message and asks the scheduler to drain this mailbox.
    pub fn push(self: &Arc<Self>, message: Message) -> bool {
        if !self.enqueue(message) {
            trace!("Mailbox closed; message dropped");
            return false;
        }
        match self.scheduler.schedule(Arc::downgrade(self)) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to schedule mailbox drain");
                false
            }
        }
    }

    /// Drains the mailbox behind `mailbox` if it still exists.
    ///
    /// This is what schedulers call from their workers. A mailbox that has
    /// been dropped or closed is silently skipped, and a paused one keeps
    /// its messages.
    pub fn maybe_receive(mailbox: &Weak<Mailbox>) {
        match mailbox.upgrade() {
            Some(mailbox) => mailbox.drain(),
            None => trace!("Mailbox dropped before drain"),
        }
    }

    fn drain(&self) {
        {
            let mut state = self.state.lock();
            if state.closed || state.draining || state.paused {
                return;
            }
            state.draining = true;
            state.drain_thread = Some(thread::current().id());
        }

        loop {
            let _receiving = self.receiving.lock();
            let message = {
                let mut state = self.state.lock();
                let next = if state.closed {
                    None
                } else {
                    state.queue.pop_front()
                };
                if next.is_none() {
                    state.draining = false;
                    state.drain_thread = None;
                }
                next
            };
            match message {
                Some(message) => message(),
                None => return,
            }
        }
    }

    /// Closes the mailbox and discards queued messages.
    ///
    /// Blocks until a message currently running on another thread has
    /// finished. Called from inside a message of this mailbox it returns
    /// immediately instead.
    pub fn close(&self) {
        let (discarded, wait) = {
            let mut state = self.state.lock();
            state.closed = true;
            let discarded = std::mem::take(&mut state.queue);
            let wait = state.drain_thread != Some(thread::current().id());
            (discarded, wait)
        };
        if !discarded.is_empty() {
            trace!(discarded = discarded.len(), "Mailbox closed with queued messages");
        }
        drop(discarded);

        if wait {
            drop(self.receiving.lock());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn drain_state(&self) -> DrainState {
        if self.state.lock().draining {
            DrainState::Draining
        } else {
            DrainState::Idle
        }
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mailbox")
            .field("queued", &state.queue.len())
            .field("draining", &state.draining)
            .field("closed", &state.closed)
            .field("paused", &state.paused)
            .finish()
    }
}
