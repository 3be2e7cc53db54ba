//! Resource fetching: coalescing, cancellation and fan-out.
//!
//! The [`FetchCoordinator`] guarantees at most one concurrent fetch per
//! distinct [`Resource`](crate::resource::Resource) and hands the result to
//! every caller that asked for it. It never fetches anything itself: it
//! posts [`FetchCommand`]s to the host loop, where a [`FetchService`] runs
//! them against a [`FetchExecutor`].
//!
//! ```text
//! workers ──request()──► FetchCoordinator ──commands──► host loop ──► FetchExecutor
//!    ▲                                                                   │
//!    └────────callbacks◄──── notify_ticket() ◄──completions◄── Responder ◄┘
//! ```
//!
//! Executors provided here:
//!
//! - [`FileFetcher`] for `file://` and `asset://`
//! - [`HttpFetcher`] for `http://` and `https://`
//! - [`RoutingFetcher`] dispatching between the two by scheme

mod active;
mod command;
mod coordinator;
mod file;
mod http;
mod registry;
mod routing;
mod service;

pub use command::{FetchCommand, FetchTicket};
pub use coordinator::{CoordinatorStats, FetchCoordinator, RequestHandle};
pub use file::FileFetcher;
pub use http::{
    HttpFetcher, HttpFetcherConfig, DEFAULT_HTTP_TIMEOUT, DEFAULT_MAX_CONCURRENT,
    DEFAULT_USER_AGENT,
};
pub use routing::RoutingFetcher;
pub use service::{FetchExecutor, FetchService, Responder};

use thiserror::Error;

/// Errors from the fetch layer.
///
/// Fetch failures themselves are not errors here; they reach callers as
/// error [`Response`](crate::resource::Response)s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The command queue has been stopped; no new fetches can start.
    #[error("fetch command queue is stopped")]
    QueueStopped,

    /// The HTTP client could not be created.
    #[error("failed to create HTTP client: {0}")]
    HttpClient(String),
}
