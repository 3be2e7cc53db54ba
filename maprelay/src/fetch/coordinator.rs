//! Request coalescing and fan-out for resource fetches.
//!
//! # Architecture
//!
//! ```text
//! worker A ─ request(R) ─┐                         host loop
//! worker B ─ request(R) ─┼──► ObserverRegistry ──► Start(R#1) ──► executor
//! worker C ─ request(R) ─┘    R -> [A, B, C]                         │
//!                                  │                                 │
//!                                  ▼                                 │
//!                    A, B, C receive the same ◄─── notify(R#1) ◄─────┘
//!                    response exactly once
//! ```
//!
//! Only the first waiter for a resource starts a fetch. Later waiters join
//! the existing entry. Cancelling the last waiter abandons the fetch;
//! cancelling any other waiter just removes it.

use super::registry::{Joined, Left, ObserverRegistry};
use super::{FetchCommand, FetchError, FetchTicket};
use crate::resource::{Request, RequestId, Resource, Response};
use crate::work_queue::WorkQueue;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace};

/// Snapshot of coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Requests accepted.
    pub total_requests: u64,
    /// Requests that joined an in-flight fetch.
    pub coalesced_requests: u64,
    /// Requests that started a fetch.
    pub new_fetches: u64,
    /// Requests cancelled before delivery.
    pub cancelled: u64,
    /// Callbacks invoked with a response.
    pub delivered: u64,
    /// Completions ignored because their episode was no longer in flight.
    pub stale_completions: u64,
}

impl CoordinatorStats {
    /// Fraction of requests that did not need their own fetch (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_fetches: AtomicU64,
    cancelled: AtomicU64,
    delivered: AtomicU64,
    stale_completions: AtomicU64,
}

/// Coalesces concurrent requests for the same resource into one fetch.
///
/// Shared through an `Arc`. [`request`](Self::request) and cancellation
/// work from any thread; [`notify`](Self::notify) and
/// [`notify_ticket`](Self::notify_ticket) belong on the host loop.
pub struct FetchCoordinator {
    registry: ObserverRegistry,
    counters: Counters,
}

impl FetchCoordinator {
    /// Creates a coordinator posting commands to `commands`.
    pub fn new(commands: WorkQueue<FetchCommand>) -> Arc<Self> {
        Arc::new(Self {
            registry: ObserverRegistry::new(commands),
            counters: Counters::default(),
        })
    }

    /// Registers interest in `resource`.
    ///
    /// Posts a start command if no fetch for `resource` is in flight, and
    /// otherwise just joins the existing one. Never waits for the fetch.
    /// Dropping the returned handle cancels the request.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::QueueStopped`] if the command queue has been
    /// stopped. Nothing is registered in that case.
    pub fn request<F>(
        self: &Arc<Self>,
        resource: Resource,
        callback: F,
    ) -> Result<RequestHandle, FetchError>
    where
        F: FnOnce(Response) + Send + 'static,
    {
        let request = Arc::new(Request::new(resource, callback));

        match self.registry.join(&request)? {
            Joined::Coalesced { waiters } => {
                self.counters
                    .coalesced_requests
                    .fetch_add(1, Ordering::Relaxed);
                debug!(
                    resource = %request.resource(),
                    request = %request.id(),
                    waiters,
                    "Coalescing request - fetch already in flight"
                );
            }
            Joined::Started(ticket) => {
                self.counters.new_fetches.fetch_add(1, Ordering::Relaxed);
                debug!(
                    resource = %request.resource(),
                    request = %request.id(),
                    episode = ticket.episode(),
                    "New request - starting fetch"
                );
            }
        }
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);

        Ok(RequestHandle {
            request,
            coordinator: Arc::downgrade(self),
            detached: AtomicBool::new(false),
        })
    }

    /// Cancels the request behind `handle`.
    pub fn cancel(&self, handle: RequestHandle) {
        handle.mark_detached();
        self.cancel_request(&handle.request);
    }

    fn cancel_request(&self, request: &Request) {
        if request.cancel() {
            self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        match self.registry.leave(request.resource(), request.id()) {
            Left::NotWaiting => trace!(
                request = %request.id(),
                "Cancel after completion - nothing to do"
            ),
            Left::Remaining(waiters) => debug!(
                resource = %request.resource(),
                request = %request.id(),
                waiters,
                "Request cancelled - fetch continues for remaining waiters"
            ),
            Left::Cancelled(ticket) => debug!(
                resource = %request.resource(),
                request = %request.id(),
                episode = ticket.episode(),
                "Last waiter cancelled - abandoning fetch"
            ),
        }
    }

    /// Delivers `response` to every waiter of the current episode of
    /// `resource`. Host loop only.
    ///
    /// A resource with nothing in flight is ignored.
    pub fn notify(&self, resource: &Resource, response: Response) {
        match self.registry.complete(resource) {
            Some((episode, waiters)) => self.fan_out(resource, episode, waiters, response),
            None => trace!(resource = %resource, "Completion with no waiters"),
        }
    }

    /// Like [`notify`](Self::notify), but ignores completions for an
    /// episode that has since been cancelled or superseded.
    pub fn notify_ticket(&self, ticket: &FetchTicket, response: Response) {
        match self.registry.complete_episode(ticket) {
            Some(waiters) => {
                self.fan_out(ticket.resource(), ticket.episode(), waiters, response)
            }
            None => {
                self.counters
                    .stale_completions
                    .fetch_add(1, Ordering::Relaxed);
                trace!(ticket = %ticket, "Ignoring stale completion");
            }
        }
    }

    fn fan_out(
        &self,
        resource: &Resource,
        episode: u64,
        waiters: Vec<Arc<Request>>,
        response: Response,
    ) {
        let total = waiters.len();
        let delivered = waiters
            .iter()
            .filter(|waiter| waiter.deliver(response.clone()))
            .count();
        self.counters
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);

        debug!(
            resource = %resource,
            episode,
            waiters = total,
            delivered,
            outcome = %response,
            "Fan-out complete"
        );
    }

    /// Number of resources with a fetch in flight.
    pub fn in_flight_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of waiters on the in-flight fetch of `resource`.
    pub fn waiter_count(&self, resource: &Resource) -> usize {
        self.registry.waiters(resource)
    }

    pub fn stats(&self) -> CoordinatorStats {
        let c = &self.counters;
        CoordinatorStats {
            total_requests: c.total_requests.load(Ordering::Relaxed),
            coalesced_requests: c.coalesced_requests.load(Ordering::Relaxed),
            new_fetches: c.new_fetches.load(Ordering::Relaxed),
            cancelled: c.cancelled.load(Ordering::Relaxed),
            delivered: c.delivered.load(Ordering::Relaxed),
            stale_completions: c.stale_completions.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.stats();
        info!(
            total_requests = stats.total_requests,
            coalesced = stats.coalesced_requests,
            new_fetches = stats.new_fetches,
            cancelled = stats.cancelled,
            delivered = stats.delivered,
            stale = stats.stale_completions,
            in_flight = self.in_flight_count(),
            coalescing_ratio = format!("{:.1}%", stats.coalescing_ratio() * 100.0),
            "Fetch coalescing statistics"
        );
    }
}

impl fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("in_flight", &self.in_flight_count())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Caller-side ownership of a request.
///
/// Dropping the handle cancels the request unless it has already been
/// delivered. Use [`detach`](Self::detach) to let the request run to
/// completion without holding on to the handle.
pub struct RequestHandle {
    request: Arc<Request>,
    coordinator: Weak<FetchCoordinator>,
    detached: AtomicBool,
}

impl RequestHandle {
    pub fn id(&self) -> RequestId {
        self.request.id()
    }

    pub fn resource(&self) -> &Resource {
        self.request.resource()
    }

    /// True until the callback has run or the request was cancelled.
    pub fn is_pending(&self) -> bool {
        self.request.is_pending()
    }

    /// Cancels the request now.
    pub fn cancel(self) {
        drop(self);
    }

    /// Gives up ownership without cancelling.
    ///
    /// The callback still runs when the fetch completes.
    pub fn detach(self) {
        self.mark_detached();
    }

    fn mark_detached(&self) {
        self.detached.store(true, Ordering::Relaxed);
    }
}

impl Drop for RequestHandle {
    fn drop(&mut self) {
        if self.detached.load(Ordering::Relaxed) {
            return;
        }
        match self.coordinator.upgrade() {
            Some(coordinator) => coordinator.cancel_request(&self.request),
            None => {
                self.request.cancel();
            }
        }
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.request.id())
            .field("resource", self.request.resource())
            .field("pending", &self.is_pending())
            .finish()
    }
}
