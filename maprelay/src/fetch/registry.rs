//! Observer registry: which resources are in flight and who waits on them.

use super::{FetchCommand, FetchError, FetchTicket};
use crate::resource::{Request, RequestId, Resource};
use crate::work_queue::WorkQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Entry {
    episode: u64,
    waiters: Vec<Arc<Request>>,
}

struct RegistryState {
    entries: HashMap<Resource, Entry>,
    next_episode: u64,
}

/// Result of adding a waiter.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Joined {
    /// A fetch was already in flight; `waiters` now includes the new one.
    Coalesced { waiters: usize },
    /// This waiter started a new episode.
    Started(FetchTicket),
}

/// Result of removing a waiter.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Left {
    /// The request was not waiting (already delivered or never joined).
    NotWaiting,
    /// Other waiters remain; the fetch continues.
    Remaining(usize),
    /// That was the last waiter; the episode was cancelled.
    Cancelled(FetchTicket),
}

/// The in-flight map plus the command queue it posts to.
///
/// Every mutation happens under one lock, and the start/cancel commands are
/// posted while that lock is held, so the command order on the host loop
/// always matches the order of registry changes. The command queue is kept
/// referenced on the loop for as long as any entry exists.
///
/// No callback ever runs under the lock: completed waiter lists are handed
/// back to the caller for delivery.
pub(crate) struct ObserverRegistry {
    state: Mutex<RegistryState>,
    commands: WorkQueue<FetchCommand>,
}

impl ObserverRegistry {
    pub(crate) fn new(commands: WorkQueue<FetchCommand>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                entries: HashMap::new(),
                next_episode: 1,
            }),
            commands,
        }
    }

    /// Adds `request` as a waiter, starting a fetch if it is the first.
    pub(crate) fn join(&self, request: &Arc<Request>) -> Result<Joined, FetchError> {
        let mut state = self.state.lock();
        let resource = request.resource();

        if let Some(entry) = state.entries.get_mut(resource) {
            entry.waiters.push(Arc::clone(request));
            return Ok(Joined::Coalesced {
                waiters: entry.waiters.len(),
            });
        }

        let episode = state.next_episode;
        let ticket = FetchTicket::new(resource.clone(), episode);
        if self
            .commands
            .send(FetchCommand::Start(ticket.clone()))
            .is_err()
        {
            return Err(FetchError::QueueStopped);
        }
        state.next_episode += 1;

        let was_idle = state.entries.is_empty();
        state.entries.insert(
            resource.clone(),
            Entry {
                episode,
                waiters: vec![Arc::clone(request)],
            },
        );
        if was_idle {
            self.commands.ref_loop();
        }
        Ok(Joined::Started(ticket))
    }

    /// Removes the waiter with `id` for `resource`.
    pub(crate) fn leave(&self, resource: &Resource, id: RequestId) -> Left {
        let mut state = self.state.lock();

        let Some(entry) = state.entries.get_mut(resource) else {
            return Left::NotWaiting;
        };
        let before = entry.waiters.len();
        entry.waiters.retain(|waiter| waiter.id() != id);
        if entry.waiters.len() == before {
            return Left::NotWaiting;
        }
        if !entry.waiters.is_empty() {
            return Left::Remaining(entry.waiters.len());
        }

        let episode = entry.episode;
        state.entries.remove(resource);
        let ticket = FetchTicket::new(resource.clone(), episode);
        // A stopped queue has no executor left to cancel anything.
        let _ = self.commands.send(FetchCommand::Cancel(ticket.clone()));
        if state.entries.is_empty() {
            self.commands.unref_loop();
        }
        Left::Cancelled(ticket)
    }

    /// Ends whatever episode is in flight for `resource` and returns its
    /// waiters.
    pub(crate) fn complete(&self, resource: &Resource) -> Option<(u64, Vec<Arc<Request>>)> {
        let mut state = self.state.lock();
        let entry = state.entries.remove(resource)?;
        if state.entries.is_empty() {
            self.commands.unref_loop();
        }
        Some((entry.episode, entry.waiters))
    }

    /// Ends the episode named by `ticket`.
    ///
    /// Returns `None` without touching the registry if that episode is no
    /// longer in flight.
    pub(crate) fn complete_episode(&self, ticket: &FetchTicket) -> Option<Vec<Arc<Request>>> {
        let mut state = self.state.lock();
        match state.entries.get(ticket.resource()) {
            Some(entry) if entry.episode == ticket.episode() => {}
            _ => return None,
        }
        let entry = state.entries.remove(ticket.resource())?;
        if state.entries.is_empty() {
            self.commands.unref_loop();
        }
        Some(entry.waiters)
    }

    /// Number of resources with a fetch in flight.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub(crate) fn waiters(&self, resource: &Resource) -> usize {
        self.state
            .lock()
            .entries
            .get(resource)
            .map_or(0, |entry| entry.waiters.len())
    }
}
