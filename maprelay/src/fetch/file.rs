//! Local file executor for `file://` and `asset://` URLs.

use super::active::ActiveFetches;
use super::{FetchExecutor, FetchTicket, Responder};
use crate::resource::{ErrorReason, Response};
use reqwest::Url;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::runtime::Handle;
use tracing::debug;

/// Reads resources from the local filesystem.
///
/// `file://` URLs are absolute paths. `asset://` URLs are resolved against
/// the asset root, when one is configured.
pub struct FileFetcher {
    runtime: Handle,
    asset_root: Option<PathBuf>,
    active: ActiveFetches,
}

impl FileFetcher {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            asset_root: None,
            active: ActiveFetches::default(),
        }
    }

    /// Serves `asset://` URLs from `root`.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Fetches currently being read.
    pub fn in_flight(&self) -> usize {
        self.active.len()
    }

    fn resolve(&self, url: &str) -> Result<PathBuf, Response> {
        if let Some(relative) = url.strip_prefix("asset://") {
            let Some(root) = &self.asset_root else {
                return Err(Response::error(
                    ErrorReason::Other,
                    "no asset root configured",
                ));
            };
            let relative = Path::new(relative.trim_start_matches('/'));
            if !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
            {
                return Err(Response::error(
                    ErrorReason::Other,
                    format!("asset path escapes the asset root: {}", url),
                ));
            }
            return Ok(root.join(relative));
        }

        Url::parse(url)
            .ok()
            .filter(|parsed| parsed.scheme() == "file")
            .and_then(|parsed| parsed.to_file_path().ok())
            .ok_or_else(|| {
                Response::error(ErrorReason::Other, format!("invalid file URL: {}", url))
            })
    }
}

impl FetchExecutor for FileFetcher {
    fn start(&mut self, ticket: FetchTicket, responder: Responder) {
        let path = match self.resolve(ticket.resource().url()) {
            Ok(path) => path,
            Err(response) => {
                responder.respond(response);
                return;
            }
        };
        debug!(ticket = %ticket, path = %path.display(), "Reading file");
        self.active.spawn(&self.runtime, responder, read_file(path));
    }

    fn cancel(&mut self, ticket: &FetchTicket) {
        self.active.cancel(ticket);
    }
}

impl Drop for FileFetcher {
    fn drop(&mut self) {
        self.active.cancel_all();
    }
}

async fn read_file(path: PathBuf) -> Response {
    match tokio::fs::read(&path).await {
        Ok(bytes) => Response::data(bytes),
        Err(e) => io_error_response(&path, &e),
    }
}

fn io_error_response(path: &Path, error: &io::Error) -> Response {
    let reason = match error.kind() {
        io::ErrorKind::NotFound => ErrorReason::NotFound,
        _ => ErrorReason::Other,
    };
    Response::error(reason, format!("{}: {}", path.display(), error))
}
