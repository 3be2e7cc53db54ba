//! Scheduler on a tokio runtime's blocking pool.

use super::{Mailbox, Message, Scheduler, SchedulerError};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::{Handle, TryCurrentError};
use tracing::trace;

/// Drains mailboxes with `spawn_blocking` on a tokio runtime.
///
/// Message handlers are ordinary synchronous code, so they run on the
/// blocking pool rather than on async worker threads. Supports delayed
/// delivery through `tokio::time::sleep`.
#[derive(Debug, Clone)]
pub struct RuntimeScheduler {
    handle: Handle,
}

impl RuntimeScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Uses the runtime of the calling task.
    ///
    /// # Errors
    ///
    /// Fails when called outside a tokio runtime.
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(Self::new)
    }
}

impl Scheduler for RuntimeScheduler {
    fn schedule(&self, mailbox: Weak<Mailbox>) -> Result<(), SchedulerError> {
        self.handle
            .spawn_blocking(move || Mailbox::maybe_receive(&mailbox));
        Ok(())
    }

    fn supports_delayed(&self) -> bool {
        true
    }

    fn schedule_after(
        &self,
        delay: Duration,
        mailbox: Weak<Mailbox>,
        message: Message,
    ) -> Result<(), SchedulerError> {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            match mailbox.upgrade() {
                Some(mailbox) => {
                    mailbox.push(message);
                }
                None => trace!(
                    delay_ms = delay.as_millis() as u64,
                    "Mailbox dropped before delayed message"
                ),
            }
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tokio-runtime"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    const LIMIT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_schedule_drains_on_blocking_pool() {
        let scheduler = Arc::new(RuntimeScheduler::try_current().unwrap());
        let mailbox = Arc::new(Mailbox::new(scheduler));
        let (tx, rx) = oneshot::channel();

        mailbox.push(Box::new(move || {
            let _ = tx.send(std::thread::current().name().map(str::to_owned));
        }));

        let thread_name = timeout(LIMIT, rx).await.unwrap().unwrap();
        assert!(thread_name.is_some());
    }

    #[tokio::test]
    async fn test_schedule_after_delivers_later() {
        let scheduler = Arc::new(RuntimeScheduler::try_current().unwrap());
        assert!(scheduler.supports_delayed());
        let mailbox = Arc::new(Mailbox::new(scheduler.clone()));
        let (tx, rx) = oneshot::channel();

        let started = std::time::Instant::now();
        scheduler
            .schedule_after(
                Duration::from_millis(30),
                Arc::downgrade(&mailbox),
                Box::new(move || {
                    let _ = tx.send(());
                }),
            )
            .unwrap();

        timeout(LIMIT, rx).await.unwrap().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_delayed_message_for_dropped_mailbox_is_discarded() {
        let scheduler = Arc::new(RuntimeScheduler::try_current().unwrap());
        let mailbox = Arc::new(Mailbox::new(scheduler.clone()));
        let (tx, rx) = oneshot::channel::<()>();

        scheduler
            .schedule_after(
                Duration::from_millis(10),
                Arc::downgrade(&mailbox),
                Box::new(move || {
                    let _ = tx.send(());
                }),
            )
            .unwrap();
        drop(mailbox);

        // The sender is dropped without running.
        assert!(timeout(LIMIT, rx).await.unwrap().is_err());
    }

    #[test]
    fn test_try_current_outside_runtime_fails() {
        assert!(RuntimeScheduler::try_current().is_err());
    }
}
