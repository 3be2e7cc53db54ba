//! Host-side fetch service: runs commands against an executor on the loop.

use super::{FetchCommand, FetchCoordinator, FetchTicket};
use crate::resource::{ErrorReason, Response};
use crate::runloop::{LoopHandle, RunLoopError};
use crate::work_queue::{WeakWorkQueue, WorkQueue};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, trace};

/// Performs fetches on behalf of the coordinator.
///
/// Both methods are called on the host loop. `start` must not block: it
/// hands the work off and answers later through the [`Responder`], from
/// any thread. Every started fetch produces exactly one completion, either
/// an explicit [`Responder::respond`] or the abandonment error sent when
/// the responder is dropped.
pub trait FetchExecutor: Send {
    fn start(&mut self, ticket: FetchTicket, responder: Responder);

    /// Abandons the fetch for `ticket`. Any answer it still produces is
    /// ignored.
    fn cancel(&mut self, ticket: &FetchTicket);
}

/// A completed fetch travelling back to the host loop.
struct Completion {
    ticket: FetchTicket,
    response: Response,
}

/// One-shot reply channel for a started fetch.
///
/// Can be moved to any thread. Dropping it without calling
/// [`respond`](Self::respond) delivers an [`ErrorReason::Other`] error so
/// waiters are never left hanging.
pub struct Responder {
    ticket: FetchTicket,
    completions: Option<WorkQueue<Completion>>,
}

impl Responder {
    fn new(ticket: FetchTicket, completions: WorkQueue<Completion>) -> Self {
        Self {
            ticket,
            completions: Some(completions),
        }
    }

    pub fn ticket(&self) -> &FetchTicket {
        &self.ticket
    }

    /// Sends `response` to the host loop for fan-out.
    pub fn respond(mut self, response: Response) {
        self.send(response);
    }

    fn send(&mut self, response: Response) {
        let Some(completions) = self.completions.take() else {
            return;
        };
        let completion = Completion {
            ticket: self.ticket.clone(),
            response,
        };
        if completions.send(completion).is_err() {
            debug!(ticket = %self.ticket, "Fetch service stopped; response discarded");
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.completions.is_some() {
            trace!(ticket = %self.ticket, "Responder dropped without a response");
            self.send(Response::error(ErrorReason::Other, "fetch abandoned"));
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("ticket", &self.ticket)
            .field("answered", &self.completions.is_none())
            .finish()
    }
}

/// State shared by the command and completion callbacks.
#[derive(Default)]
struct ServiceState {
    coordinator: OnceLock<Weak<FetchCoordinator>>,
    completions: OnceLock<WeakWorkQueue<Completion>>,
    /// Fetches started but not yet answered.
    outstanding: AtomicUsize,
}

/// Wires a [`FetchCoordinator`] to a [`FetchExecutor`] on a host loop.
///
/// Owns two work queues on the loop: commands from the coordinator, and
/// completions from responders. The completion queue keeps the loop alive
/// while any started fetch is unanswered, so the loop does not exit with
/// a response still on its way.
pub struct FetchService {
    coordinator: Arc<FetchCoordinator>,
    commands: WorkQueue<FetchCommand>,
    completions: WorkQueue<Completion>,
    state: Arc<ServiceState>,
}

impl FetchService {
    /// # Errors
    ///
    /// Returns [`RunLoopError::Closed`] if the loop has been dropped.
    pub fn new(
        handle: &LoopHandle,
        executor: Box<dyn FetchExecutor>,
    ) -> Result<Self, RunLoopError> {
        let state = Arc::new(ServiceState::default());

        let completions = {
            let state = Arc::clone(&state);
            WorkQueue::new(handle, move |completion: Completion| {
                if let Some(coordinator) = state.coordinator.get().and_then(Weak::upgrade) {
                    coordinator.notify_ticket(&completion.ticket, completion.response);
                }
                if state.outstanding.fetch_sub(1, Ordering::AcqRel) == 1 {
                    // Last answer is in; the loop may exit again.
                    let queue = state.completions.get().and_then(WeakWorkQueue::upgrade);
                    if let Some(queue) = queue {
                        queue.unref_loop();
                    }
                }
            })?
        };
        let _ = state.completions.set(completions.downgrade());

        let commands = {
            let state = Arc::clone(&state);
            let completions = completions.clone();
            let mut executor = executor;
            WorkQueue::new(handle, move |command: FetchCommand| match command {
                FetchCommand::Start(ticket) => {
                    if state.outstanding.fetch_add(1, Ordering::AcqRel) == 0 {
                        completions.ref_loop();
                    }
                    debug!(ticket = %ticket, "Starting fetch");
                    let responder = Responder::new(ticket.clone(), completions.clone());
                    executor.start(ticket, responder);
                }
                FetchCommand::Cancel(ticket) => {
                    debug!(ticket = %ticket, "Cancelling fetch");
                    executor.cancel(&ticket);
                }
            })?
        };

        let coordinator = FetchCoordinator::new(commands.clone());
        let _ = state.coordinator.set(Arc::downgrade(&coordinator));

        Ok(Self {
            coordinator,
            commands,
            completions,
            state,
        })
    }

    pub fn coordinator(&self) -> &Arc<FetchCoordinator> {
        &self.coordinator
    }

    /// Started fetches still waiting for an answer.
    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::Acquire)
    }

    /// Stops both queues immediately and returns a future that resolves
    /// once the loop has detached them.
    ///
    /// New requests fail with [`FetchError::QueueStopped`](super::FetchError)
    /// from here on. Answers still in flight are discarded, and the executor
    /// is dropped on the loop.
    pub fn stop(&self) -> impl Future<Output = ()> + Send + 'static {
        let commands = self.commands.stop();
        let completions = self.completions.stop();
        async move {
            commands.await;
            completions.await;
            debug!("Fetch service stopped");
        }
    }
}

impl fmt::Debug for FetchService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchService")
            .field("coordinator", &self.coordinator)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}
