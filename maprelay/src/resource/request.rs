//! A single caller's interest in a resource.

use super::response::Response;
use super::types::Resource;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Completion callback invoked at most once with the fetch result.
pub type Callback = Box<dyn FnOnce(Response) + Send + 'static>;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique request identity.
///
/// Two requests for the same [`Resource`] always have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// One caller's in-flight interest in a [`Resource`].
///
/// The callback lives behind a lock and is taken out exactly once, either
/// by [`deliver`](Self::deliver) or by [`cancel`](Self::cancel). Whichever
/// runs first wins; the other becomes a no-op. This is what makes a
/// cancel racing a notify safe.
pub struct Request {
    id: RequestId,
    resource: Resource,
    cancelled: AtomicBool,
    callback: Mutex<Option<Callback>>,
}

impl Request {
    /// Creates a new request with a fresh id.
    pub fn new<F>(resource: Resource, callback: F) -> Self
    where
        F: FnOnce(Response) + Send + 'static,
    {
        Self {
            id: RequestId::next(),
            resource,
            cancelled: AtomicBool::new(false),
            callback: Mutex::new(Some(Box::new(callback))),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns true while the callback has neither run nor been cancelled.
    pub fn is_pending(&self) -> bool {
        self.callback.lock().is_some()
    }

    /// Marks the request cancelled and drops its callback.
    ///
    /// Returns true if the request was still pending.
    pub fn cancel(&self) -> bool {
        self.cancelled.store(true, Ordering::Release);
        let callback = self.callback.lock().take();
        callback.is_some()
    }

    /// Invokes the callback with `response` unless it already ran or the
    /// request was cancelled.
    ///
    /// The callback runs after the internal lock is released. Returns true
    /// if the callback was invoked.
    pub fn deliver(&self, response: Response) -> bool {
        if self.is_cancelled() {
            return false;
        }
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                callback(response);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("resource", &self.resource)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_request(counter: &Arc<AtomicUsize>) -> Request {
        let counter = Arc::clone(counter);
        Request::new(Resource::tile("tile/0/0/0"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_ids_are_unique_for_same_resource() {
        let a = Request::new(Resource::tile("t"), |_| {});
        let b = Request::new(Resource::tile("t"), |_| {});
        assert_ne!(a.id(), b.id());
        assert_eq!(a.resource(), b.resource());
    }

    #[test]
    fn test_deliver_runs_callback_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let request = counting_request(&counter);

        assert!(request.deliver(Response::data("a")));
        assert!(!request.deliver(Response::data("b")));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!request.is_pending());
    }

    #[test]
    fn test_cancel_prevents_delivery() {
        let counter = Arc::new(AtomicUsize::new(0));
        let request = counting_request(&counter);

        assert!(request.cancel());
        assert!(request.is_cancelled());
        assert!(!request.deliver(Response::data("a")));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cancel_after_delivery_is_noop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let request = counting_request(&counter);

        request.deliver(Response::data("a"));
        assert!(!request.cancel());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_racing_cancel_and_deliver_fire_at_most_once() {
        for _ in 0..200 {
            let counter = Arc::new(AtomicUsize::new(0));
            let request = Arc::new(counting_request(&counter));

            let canceller = {
                let request = Arc::clone(&request);
                std::thread::spawn(move || {
                    request.cancel();
                })
            };
            request.deliver(Response::data("a"));
            canceller.join().unwrap();

            assert!(counter.load(Ordering::SeqCst) <= 1);
        }
    }

    #[test]
    fn test_request_id_display() {
        let request = Request::new(Resource::tile("t"), |_| {});
        assert!(request.id().to_string().starts_with("req-"));
    }
}
