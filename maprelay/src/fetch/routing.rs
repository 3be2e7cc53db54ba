//! Scheme-based dispatch across executors.

use super::{
    FetchError, FetchExecutor, FetchTicket, FileFetcher, HttpFetcher, HttpFetcherConfig, Responder,
};
use crate::resource::{ErrorReason, Response};
use std::path::PathBuf;
use tokio::runtime::Handle;
use tracing::debug;

/// Which executor handles a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    File,
    Http,
    Unsupported,
}

fn route(url: &str) -> Route {
    match url.split_once("://").map(|(scheme, _)| scheme) {
        Some("file") | Some("asset") => Route::File,
        Some("http") | Some("https") => Route::Http,
        _ => Route::Unsupported,
    }
}

/// The default executor: local files and assets go to [`FileFetcher`],
/// everything web goes to [`HttpFetcher`]. Other schemes fail at once with
/// [`ErrorReason::Other`].
pub struct RoutingFetcher {
    file: FileFetcher,
    http: HttpFetcher,
}

impl RoutingFetcher {
    pub fn new(file: FileFetcher, http: HttpFetcher) -> Self {
        Self { file, http }
    }

    /// Builds both executors on `runtime`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::HttpClient`] if the HTTP client cannot be
    /// built.
    pub fn from_config(
        config: &HttpFetcherConfig,
        asset_root: Option<PathBuf>,
        runtime: Handle,
    ) -> Result<Self, FetchError> {
        let http = HttpFetcher::new(config, runtime.clone())?;
        let file = match asset_root {
            Some(root) => FileFetcher::new(runtime).with_asset_root(root),
            None => FileFetcher::new(runtime),
        };
        Ok(Self::new(file, http))
    }
}

impl FetchExecutor for RoutingFetcher {
    fn start(&mut self, ticket: FetchTicket, responder: Responder) {
        match route(ticket.resource().url()) {
            Route::File => self.file.start(ticket, responder),
            Route::Http => self.http.start(ticket, responder),
            Route::Unsupported => {
                debug!(ticket = %ticket, "No executor for URL scheme");
                let scheme = ticket.resource().scheme().unwrap_or("<none>");
                responder.respond(Response::error(
                    ErrorReason::Other,
                    format!("unsupported URL scheme: {}", scheme),
                ));
            }
        }
    }

    fn cancel(&mut self, ticket: &FetchTicket) {
        match route(ticket.resource().url()) {
            Route::File => self.file.cancel(ticket),
            Route::Http => self.http.cancel(ticket),
            Route::Unsupported => {}
        }
    }
}
