//! Actors with weakly referenced mailboxes.
//!
//! An [`Actor`] owns an object and a [`Mailbox`]. Everyone else talks to it
//! through an [`ActorRef`], which holds only weak references and re-checks
//! them at the moment a message would run. Destroying an actor therefore
//! never races with a message touching freed state.
//!
//! Mailbox drains are dispatched by a [`Scheduler`]:
//!
//! | Scheduler            | Runs drains on                 | Delayed delivery |
//! |----------------------|--------------------------------|------------------|
//! | [`ThreadPool`]       | dedicated worker threads       | no               |
//! | [`RuntimeScheduler`] | tokio blocking pool            | yes              |
//! | [`LoopScheduler`]    | the host loop                  | no               |
//!
//! # Example
//!
//! ```
//! use maprelay::actor::{Actor, Scheduler, ThreadPool};
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let scheduler: Arc<dyn Scheduler> = Arc::new(ThreadPool::new(2).unwrap());
//! let actor = Actor::new(scheduler, Vec::<u32>::new());
//! let actor_ref = actor.self_ref();
//!
//! actor_ref.invoke(|values| values.push(1));
//! let len = actor_ref.ask(|values| values.len()).await.unwrap();
//! assert_eq!(len, 1);
//! # });
//! ```

mod handle;
mod loop_scheduler;
mod mailbox;
mod runtime;
mod scheduler;
mod thread_pool;

pub use handle::{Actor, ActorRef};
pub use loop_scheduler::LoopScheduler;
pub use mailbox::{DrainState, Mailbox};
pub use runtime::RuntimeScheduler;
pub use scheduler::Scheduler;
pub use thread_pool::ThreadPool;

use thiserror::Error;

/// A unit of work delivered to a mailbox.
pub type Message = Box<dyn FnOnce() + Send + 'static>;

/// Errors reported by schedulers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The scheduler has no timers.
    #[error("scheduler does not support delayed delivery")]
    DelayedUnsupported,

    /// The scheduler has been shut down.
    #[error("scheduler is shut down")]
    ShutDown,
}
