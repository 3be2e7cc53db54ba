//! Resource and request model.
//!
//! Value types shared by everything that fetches:
//!
//! - [`Resource`]: what to fetch (URL + [`ResourceKind`]); the coalescing key
//! - [`Request`]: one caller's interest in a resource, with a single-shot callback
//! - [`Response`]: what a fetch produced, delivered identically to every waiter

mod request;
mod response;
mod types;

pub use request::{Callback, Request, RequestId};
pub use response::{CacheMetadata, ErrorReason, Outcome, Response, ResponseError};
pub use types::{ParseResourceKindError, Resource, ResourceKind};
