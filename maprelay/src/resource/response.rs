//! Fetch responses delivered to waiting requests.
//!
//! A [`Response`] is produced once per fetch episode and handed, unchanged, to
//! every request that was waiting on the resource. The payload is held in
//! [`Bytes`] so cloning a response for fan-out never copies the data.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// Why a fetch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorReason {
    /// The resource does not exist (HTTP 404, missing file).
    NotFound,
    /// The server reported an error (HTTP 5xx).
    Server,
    /// The connection failed before a response arrived.
    Connection,
    /// The server is rate limiting us (HTTP 429).
    RateLimit,
    /// Anything else, including abandoned fetches.
    Other,
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Server => write!(f, "server error"),
            Self::Connection => write!(f, "connection error"),
            Self::RateLimit => write!(f, "rate limited"),
            Self::Other => write!(f, "error"),
        }
    }
}

/// A failed fetch, with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}: {message}")]
pub struct ResponseError {
    pub reason: ErrorReason,
    pub message: String,
}

impl ResponseError {
    pub fn new(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// What a fetch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The payload.
    Data(Bytes),
    /// The fetch succeeded but there is no payload (HTTP 204).
    NoContent,
    /// The previously delivered payload is still current (HTTP 304).
    NotModified,
    /// The fetch failed.
    Error(ResponseError),
}

/// Optional cache validators and freshness information.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetadata {
    pub etag: Option<String>,
    pub modified: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

/// The result of one fetch episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub outcome: Outcome,
    pub cache: CacheMetadata,
}

impl Response {
    /// A successful response carrying `data`.
    pub fn data(data: impl Into<Bytes>) -> Self {
        Self {
            outcome: Outcome::Data(data.into()),
            cache: CacheMetadata::default(),
        }
    }

    /// A failed response.
    pub fn error(reason: ErrorReason, message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Error(ResponseError::new(reason, message)),
            cache: CacheMetadata::default(),
        }
    }

    pub fn not_modified() -> Self {
        Self {
            outcome: Outcome::NotModified,
            cache: CacheMetadata::default(),
        }
    }

    pub fn no_content() -> Self {
        Self {
            outcome: Outcome::NoContent,
            cache: CacheMetadata::default(),
        }
    }

    /// Attaches cache metadata to the response.
    pub fn with_cache(mut self, cache: CacheMetadata) -> Self {
        self.cache = cache;
        self
    }

    /// Returns the payload, if this response carries one.
    pub fn payload(&self) -> Option<&Bytes> {
        match &self.outcome {
            Outcome::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the error, if the fetch failed.
    pub fn error_info(&self) -> Option<&ResponseError> {
        match &self.outcome {
            Outcome::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }

    /// Returns true if the response carries an expiry that lies before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.cache.expires.is_some_and(|expires| expires < now)
    }

    /// Returns true if the response can be shown to the user at `now`.
    ///
    /// Errors are never usable. Everything else is usable until it expires.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_error() && !self.is_expired(now)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Data(data) => write!(f, "{} bytes", data.len()),
            Outcome::NoContent => write!(f, "no content"),
            Outcome::NotModified => write!(f, "not modified"),
            Outcome::Error(err) => write!(f, "{}", err),
        }
    }
}
