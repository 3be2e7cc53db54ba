//! The scheduler seam between mailboxes and the threads that drain them.

use super::{Mailbox, Message, SchedulerError};
use std::sync::Weak;
use std::time::Duration;

/// Dispatches mailbox drains onto some execution context.
///
/// Implementations hand the weak mailbox reference to a worker which calls
/// [`Mailbox::maybe_receive`]. Delayed delivery is optional: check
/// [`supports_delayed`](Self::supports_delayed) before relying on
/// [`schedule_after`](Self::schedule_after).
pub trait Scheduler: Send + Sync {
    /// Arranges for `mailbox` to be drained soon.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::ShutDown`] if the scheduler no longer
    /// accepts work.
    fn schedule(&self, mailbox: Weak<Mailbox>) -> Result<(), SchedulerError>;

    /// Whether [`schedule_after`](Self::schedule_after) is implemented.
    fn supports_delayed(&self) -> bool {
        false
    }

    /// Enqueues `message` into `mailbox` after `delay`, then schedules a
    /// drain.
    ///
    /// # Errors
    ///
    /// The default implementation always returns
    /// [`SchedulerError::DelayedUnsupported`].
    fn schedule_after(
        &self,
        delay: Duration,
        mailbox: Weak<Mailbox>,
        message: Message,
    ) -> Result<(), SchedulerError> {
        let _ = (delay, mailbox, message);
        Err(SchedulerError::DelayedUnsupported)
    }

    /// Short name for log output.
    fn name(&self) -> &'static str;
}
