//! Owning actor handles and weak actor references.

use super::{Mailbox, Message, Scheduler, SchedulerError};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::trace;

/// Owns an actor object and its mailbox.
///
/// Dropping the `Actor` closes the mailbox first (waiting for a message
/// running on another thread) and only then releases the object. Queued
/// messages are discarded.
pub struct Actor<A: Send + 'static> {
    mailbox: Arc<Mailbox>,
    object: Arc<Mutex<A>>,
}

impl<A: Send + 'static> Actor<A> {
    pub fn new(scheduler: Arc<dyn Scheduler>, object: A) -> Self {
        Self {
            mailbox: Arc::new(Mailbox::new(scheduler)),
            object: Arc::new(Mutex::new(object)),
        }
    }

    /// Builds the object with a reference to itself.
    ///
    /// Messages sent through that reference while `init` runs are held and
    /// delivered once the object exists.
    pub fn with_self<F>(scheduler: Arc<dyn Scheduler>, init: F) -> Self
    where
        F: FnOnce(ActorRef<A>) -> A,
    {
        let mailbox = Arc::new(Mailbox::paused(scheduler));
        let object = Arc::new_cyclic(|weak| {
            let self_ref = ActorRef {
                mailbox: Arc::downgrade(&mailbox),
                object: weak.clone(),
            };
            Mutex::new(init(self_ref))
        });
        mailbox.open();
        Self { mailbox, object }
    }

    /// Returns a weak reference for sending messages.
    pub fn self_ref(&self) -> ActorRef<A> {
        ActorRef {
            mailbox: Arc::downgrade(&self.mailbox),
            object: Arc::downgrade(&self.object),
        }
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }
}

impl<A: Send + 'static> Drop for Actor<A> {
    fn drop(&mut self) {
        self.mailbox.close();
    }
}

impl<A: Send + 'static> fmt::Debug for Actor<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("mailbox", &self.mailbox)
            .finish_non_exhaustive()
    }
}

/// Non-owning, lifetime-checked reference to an [`Actor`].
///
/// Every send re-validates the reference. Once the actor is gone, sends are
/// no-ops.
pub struct ActorRef<A: Send + 'static> {
    mailbox: Weak<Mailbox>,
    object: Weak<Mutex<A>>,
}

impl<A: Send + 'static> ActorRef<A> {
    /// Sends `f` to run against the actor object on the actor's scheduler.
    ///
    /// Returns false if the actor has been destroyed or its scheduler
    /// refused the drain.
    pub fn invoke<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut A) + Send + 'static,
    {
        let Some(mailbox) = self.mailbox.upgrade() else {
            trace!("Actor gone; message dropped");
            return false;
        };
        mailbox.push(self.message(f))
    }

    /// Sends `f` and returns a receiver for its result.
    ///
    /// The receiver reports an error if the actor is destroyed before the
    /// message runs.
    pub fn ask<R, F>(&self, f: F) -> oneshot::Receiver<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut A) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.invoke(move |object| {
            let _ = tx.send(f(object));
        });
        rx
    }

    /// Sends `f` after `delay`.
    ///
    /// A destroyed actor is not an error; the message is simply dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DelayedUnsupported`] if the actor's
    /// scheduler has no timers.
    pub fn invoke_after<F>(&self, delay: Duration, f: F) -> Result<(), SchedulerError>
    where
        F: FnOnce(&mut A) + Send + 'static,
    {
        let Some(mailbox) = self.mailbox.upgrade() else {
            trace!("Actor gone; delayed message dropped");
            return Ok(());
        };
        let scheduler = Arc::clone(mailbox.scheduler());
        scheduler.schedule_after(delay, Arc::downgrade(&mailbox), self.message(f))
    }

    /// True while the actor exists and its mailbox is open.
    pub fn is_alive(&self) -> bool {
        self.mailbox
            .upgrade()
            .is_some_and(|mailbox| !mailbox.is_closed())
    }

    fn message<F>(&self, f: F) -> Message
    where
        F: FnOnce(&mut A) + Send + 'static,
    {
        let object = self.object.clone();
        Box::new(move || {
            if let Some(object) = object.upgrade() {
                f(&mut object.lock());
            }
        })
    }
}

impl<A: Send + 'static> Clone for ActorRef<A> {
    fn clone(&self) -> Self {
        Self {
            mailbox: self.mailbox.clone(),
            object: self.object.clone(),
        }
    }
}

impl<A: Send + 'static> fmt::Debug for ActorRef<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::{RuntimeScheduler, ThreadPool};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::timeout;

    const LIMIT: Duration = Duration::from_secs(5);

    #[derive(Default)]
    struct Counter {
        values: Vec<u32>,
    }

    fn pool() -> Arc<dyn Scheduler> {
        Arc::new(ThreadPool::new(2).unwrap())
    }

    #[tokio::test]
    async fn test_messages_run_in_send_order() {
        let actor = Actor::new(pool(), Counter::default());
        let actor_ref = actor.self_ref();

        for n in 0..50 {
            assert!(actor_ref.invoke(move |counter| counter.values.push(n)));
        }
        let values = timeout(LIMIT, actor_ref.ask(|counter| counter.values.clone()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(values, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_ask_after_destruction_reports_closed() {
        let actor = Actor::new(pool(), Counter::default());
        let actor_ref = actor.self_ref();
        drop(actor);

        assert!(!actor_ref.is_alive());
        assert!(!actor_ref.invoke(|counter| counter.values.push(1)));
        let reply = timeout(LIMIT, actor_ref.ask(|counter| counter.values.len()))
            .await
            .unwrap();
        assert!(reply.is_err());
    }

    #[tokio::test]
    async fn test_with_self_can_message_itself() {
        struct Pinger {
            self_ref: ActorRef<Pinger>,
            pings: u32,
        }

        let actor = Actor::with_self(pool(), |self_ref| Pinger { self_ref, pings: 0 });
        let actor_ref = actor.self_ref();

        actor_ref.invoke(|pinger| {
            pinger.pings += 1;
            pinger.self_ref.invoke(|pinger| pinger.pings += 1);
        });

        let mut pings = 0;
        for _ in 0..100 {
            pings = timeout(LIMIT, actor_ref.ask(|pinger| pinger.pings))
                .await
                .unwrap()
                .unwrap();
            if pings == 2 {
                break;
            }
        }
        assert_eq!(pings, 2);
    }

    #[tokio::test]
    async fn test_with_self_delivers_messages_sent_during_init() {
        struct Greeter {
            seen: Vec<u32>,
        }

        let actor = Actor::with_self(pool(), |this: ActorRef<Greeter>| {
            assert!(this.invoke(|greeter| greeter.seen.push(1)));
            // Give a pool worker time to reach the mailbox.
            std::thread::sleep(Duration::from_millis(50));
            Greeter { seen: Vec::new() }
        });

        let seen = timeout(LIMIT, actor.self_ref().ask(|greeter| greeter.seen.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen, vec![1]);
    }

    #[tokio::test]
    async fn test_invoke_after_on_pool_is_rejected() {
        let actor = Actor::new(pool(), Counter::default());
        let result = actor
            .self_ref()
            .invoke_after(Duration::from_millis(1), |counter| counter.values.push(1));
        assert_eq!(result, Err(SchedulerError::DelayedUnsupported));
    }

    #[tokio::test]
    async fn test_invoke_after_on_runtime_delivers() {
        let scheduler: Arc<dyn Scheduler> = Arc::new(RuntimeScheduler::try_current().unwrap());
        let actor = Actor::new(scheduler, Counter::default());
        let actor_ref = actor.self_ref();

        actor_ref
            .invoke_after(Duration::from_millis(20), |counter| counter.values.push(9))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        let values = timeout(LIMIT, actor_ref.ask(|counter| counter.values.clone()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![9]);
    }

    #[tokio::test]
    async fn test_self_destruction_does_not_deadlock() {
        let holder: Arc<Mutex<Option<Actor<Counter>>>> = Arc::new(Mutex::new(None));
        let actor = Actor::new(pool(), Counter::default());
        let actor_ref = actor.self_ref();
        *holder.lock() = Some(actor);

        let destroyed = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel();
        {
            let holder = Arc::clone(&holder);
            let destroyed = Arc::clone(&destroyed);
            actor_ref.invoke(move |counter| {
                counter.values.push(1);
                drop(holder.lock().take());
                destroyed.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            });
        }

        timeout(LIMIT, rx).await.unwrap().unwrap();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert!(!actor_ref.is_alive());
    }
}
