//! Scheduler that drains mailboxes on the host loop.

use super::{Mailbox, Scheduler, SchedulerError};
use crate::runloop::{Detached, LoopHandle, RunLoopError};
use crate::work_queue::WorkQueue;
use std::sync::Weak;

/// Runs every drain on the host [`RunLoop`](crate::runloop::RunLoop).
///
/// Used when no worker pool is available. Drains are funnelled through a
/// [`WorkQueue`], so they run one after another in scheduling order. No
/// timers.
#[derive(Debug, Clone)]
pub struct LoopScheduler {
    queue: WorkQueue<Weak<Mailbox>>,
}

impl LoopScheduler {
    /// # Errors
    ///
    /// Returns [`RunLoopError::Closed`] if the loop has been dropped.
    pub fn new(handle: &LoopHandle) -> Result<Self, RunLoopError> {
        let queue = WorkQueue::new(handle, |mailbox: Weak<Mailbox>| {
            Mailbox::maybe_receive(&mailbox);
        })?;
        Ok(Self { queue })
    }

    /// Keeps the host loop alive while this scheduler exists.
    pub fn ref_loop(&self) {
        self.queue.ref_loop();
    }

    pub fn unref_loop(&self) {
        self.queue.unref_loop();
    }

    /// Stops accepting drains; see [`WorkQueue::stop`].
    pub fn stop(&self) -> Detached {
        self.queue.stop()
    }
}

impl Scheduler for LoopScheduler {
    fn schedule(&self, mailbox: Weak<Mailbox>) -> Result<(), SchedulerError> {
        self.queue
            .send(mailbox)
            .map_err(|_| SchedulerError::ShutDown)
    }

    fn name(&self) -> &'static str {
        "host-loop"
    }
}
