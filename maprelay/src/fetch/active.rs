//! Bookkeeping for fetch tasks running on a tokio runtime.

use super::{FetchTicket, Responder};
use crate::resource::Response;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Cancellation tokens of the fetches an executor has in flight.
#[derive(Clone, Default)]
pub(crate) struct ActiveFetches {
    tokens: Arc<Mutex<HashMap<FetchTicket, CancellationToken>>>,
}

impl ActiveFetches {
    /// Runs `fetch` on `runtime` and answers `responder` with its result,
    /// unless the ticket is cancelled first.
    ///
    /// A cancelled fetch drops its responder, which reports the fetch as
    /// abandoned; the coordinator discards that answer as stale.
    pub(crate) fn spawn<F>(&self, runtime: &Handle, responder: Responder, fetch: F)
    where
        F: Future<Output = Response> + Send + 'static,
    {
        let ticket = responder.ticket().clone();
        let token = CancellationToken::new();
        self.tokens.lock().insert(ticket.clone(), token.clone());

        let active = self.clone();
        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!(ticket = %ticket, "Fetch task cancelled");
                    drop(responder);
                }
                response = fetch => responder.respond(response),
            }
            active.tokens.lock().remove(&ticket);
        });
    }

    /// Returns true if a fetch for `ticket` was running.
    pub(crate) fn cancel(&self, ticket: &FetchTicket) -> bool {
        match self.tokens.lock().remove(ticket) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel_all(&self) {
        let tokens: Vec<_> = self.tokens.lock().drain().map(|(_, token)| token).collect();
        for token in tokens {
            token.cancel();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.lock().len()
    }
}
