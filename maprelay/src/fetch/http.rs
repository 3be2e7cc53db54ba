//! HTTP executor for `http://` and `https://` URLs.

use super::active::ActiveFetches;
use super::{FetchError, FetchExecutor, FetchTicket, Responder};
use crate::resource::{CacheMetadata, ErrorReason, Response};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, CACHE_CONTROL, ETAG, EXPIRES, LAST_MODIFIED};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("maprelay/", env!("CARGO_PKG_VERSION"));

/// Default per-request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on simultaneous HTTP requests.
pub const DEFAULT_MAX_CONCURRENT: usize = 32;

/// Settings for [`HttpFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpFetcherConfig {
    pub timeout: Duration,
    pub user_agent: String,
    /// Requests beyond this many wait for a free slot.
    pub max_concurrent: usize,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Fetches resources over HTTP with `reqwest`.
///
/// Each fetch runs as a task on the given tokio runtime and can be
/// cancelled through its ticket. A semaphore bounds the number of requests
/// on the wire.
pub struct HttpFetcher {
    client: reqwest::Client,
    runtime: Handle,
    limiter: Arc<Semaphore>,
    active: ActiveFetches,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::HttpClient`] if the client cannot be built.
    pub fn new(config: &HttpFetcherConfig, runtime: Handle) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            runtime,
            limiter: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            active: ActiveFetches::default(),
        })
    }

    /// Fetches currently running or waiting for a slot.
    pub fn in_flight(&self) -> usize {
        self.active.len()
    }
}

impl FetchExecutor for HttpFetcher {
    fn start(&mut self, ticket: FetchTicket, responder: Responder) {
        debug!(ticket = %ticket, "Requesting over HTTP");
        let client = self.client.clone();
        let limiter = Arc::clone(&self.limiter);
        let url = ticket.resource().url().to_string();
        self.active
            .spawn(&self.runtime, responder, fetch(client, limiter, url));
    }

    fn cancel(&mut self, ticket: &FetchTicket) {
        if self.active.cancel(ticket) {
            debug!(ticket = %ticket, "HTTP request cancelled");
        }
    }
}

impl Drop for HttpFetcher {
    fn drop(&mut self) {
        self.active.cancel_all();
        self.limiter.close();
    }
}

async fn fetch(client: reqwest::Client, limiter: Arc<Semaphore>, url: String) -> Response {
    let Ok(_permit) = limiter.acquire_owned().await else {
        return Response::error(ErrorReason::Other, "HTTP fetcher shut down");
    };

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %url, error = %e, "HTTP request failed");
            return Response::error(ErrorReason::Connection, e.to_string());
        }
    };

    let status = response.status();
    let cache = cache_metadata(response.headers(), Utc::now());
    if let Some(response) = status_response(status) {
        debug!(url = %url, status = status.as_u16(), "HTTP response without body");
        return response.with_cache(cache);
    }

    match response.bytes().await {
        Ok(body) => Response::data(body).with_cache(cache),
        Err(e) => Response::error(
            ErrorReason::Connection,
            format!("failed to read response body: {}", e),
        ),
    }
}

/// Maps a status to its response, or `None` if the body should be read.
fn status_response(status: StatusCode) -> Option<Response> {
    match status.as_u16() {
        200 => None,
        204 => Some(Response::no_content()),
        304 => Some(Response::not_modified()),
        404 => Some(Response::error(ErrorReason::NotFound, "HTTP status code 404")),
        429 => Some(Response::error(ErrorReason::RateLimit, "HTTP status code 429")),
        code @ 500..=599 => Some(Response::error(
            ErrorReason::Server,
            format!("HTTP status code {}", code),
        )),
        code => Some(Response::error(
            ErrorReason::Other,
            format!("HTTP status code {}", code),
        )),
    }
}

/// Extracts validators and freshness from response headers.
///
/// `Cache-Control: max-age` takes precedence over `Expires`.
fn cache_metadata(headers: &HeaderMap, now: DateTime<Utc>) -> CacheMetadata {
    let text = |name: HeaderName| headers.get(name).and_then(|value| value.to_str().ok());

    let max_age = text(CACHE_CONTROL).and_then(parse_max_age);
    let expires = match max_age {
        Some(seconds) => chrono::Duration::try_seconds(seconds)
            .and_then(|age| now.checked_add_signed(age)),
        None => text(EXPIRES).and_then(parse_http_date),
    };

    CacheMetadata {
        etag: text(ETAG).map(str::to_string),
        modified: text(LAST_MODIFIED).and_then(parse_http_date),
        expires,
    }
}

fn parse_max_age(cache_control: &str) -> Option<i64> {
    cache_control.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|value| value.trim_matches('"').parse().ok())
    })
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
