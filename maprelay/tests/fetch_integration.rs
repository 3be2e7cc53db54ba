//! End-to-end tests for the fetch path.
//!
//! Worker threads request resources through the coordinator, the host loop
//! starts fetches on a real executor, and every waiter gets the answer.

use maprelay::fetch::{
    FetchExecutor, FetchService, FetchTicket, FileFetcher, HttpFetcherConfig, Responder,
    RoutingFetcher,
};
use maprelay::resource::{ErrorReason, Resource, Response};
use maprelay::runloop::{ExitReason, RunLoop};
use maprelay::work_queue::CompletionSignal;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

const LIMIT: Duration = Duration::from_secs(10);

// =============================================================================
// Test Helpers
// =============================================================================

/// Wraps an executor and counts started fetches per URL.
struct CountingExecutor<E> {
    inner: E,
    starts: Arc<Mutex<Vec<String>>>,
}

impl<E: FetchExecutor> FetchExecutor for CountingExecutor<E> {
    fn start(&mut self, ticket: FetchTicket, responder: Responder) {
        self.starts
            .lock()
            .push(ticket.resource().url().to_string());
        self.inner.start(ticket, responder);
    }

    fn cancel(&mut self, ticket: &FetchTicket) {
        self.inner.cancel(ticket);
    }
}

type Deliveries = Arc<Mutex<Vec<(usize, Response)>>>;

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn write_tile(dir: &TempDir, name: &str, contents: &[u8]) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    file_url(&path)
}

fn file_service(run_loop: &RunLoop) -> (FetchService, Arc<Mutex<Vec<String>>>) {
    let starts = Arc::new(Mutex::new(Vec::new()));
    let executor = CountingExecutor {
        inner: FileFetcher::new(tokio::runtime::Handle::current()),
        starts: Arc::clone(&starts),
    };
    let service = FetchService::new(&run_loop.handle(), Box::new(executor)).unwrap();
    (service, starts)
}

/// Spawns `workers` threads that each request `url` once, and waits for
/// all of them to have registered.
fn request_from_workers(
    service: &FetchService,
    url: &str,
    workers: usize,
    deliveries: &Deliveries,
) {
    let threads: Vec<_> = (0..workers)
        .map(|worker| {
            let coordinator = Arc::clone(service.coordinator());
            let deliveries = Arc::clone(deliveries);
            let url = url.to_string();
            std::thread::spawn(move || {
                coordinator
                    .request(Resource::tile(url), move |response| {
                        deliveries.lock().push((worker, response));
                    })
                    .unwrap()
                    .detach();
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }
}

// =============================================================================
// Coalescing
// =============================================================================

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let dir = TempDir::new().unwrap();
    let url = write_tile(&dir, "3-1-1.pbf", b"vector tile bytes");

    let run_loop = RunLoop::new();
    let (service, starts) = file_service(&run_loop);
    let deliveries: Deliveries = Arc::default();

    request_from_workers(&service, &url, 8, &deliveries);
    assert_eq!(service.coordinator().waiter_count(&Resource::tile(url.clone())), 8);

    let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
    assert_eq!(reason, ExitReason::Idle);

    assert_eq!(*starts.lock(), vec![url]);
    let deliveries = deliveries.lock();
    assert_eq!(deliveries.len(), 8);
    for (_, response) in deliveries.iter() {
        assert_eq!(
            response.payload().map(|b| b.as_ref()),
            Some(&b"vector tile bytes"[..])
        );
    }

    let stats = service.coordinator().stats();
    assert_eq!(stats.total_requests, 8);
    assert_eq!(stats.new_fetches, 1);
    assert_eq!(stats.coalesced_requests, 7);
    assert_eq!(service.coordinator().in_flight_count(), 0);
}

#[tokio::test]
async fn test_distinct_resources_fetch_independently() {
    let dir = TempDir::new().unwrap();
    let first = write_tile(&dir, "a.pbf", b"a");
    let second = write_tile(&dir, "b.pbf", b"b");

    let run_loop = RunLoop::new();
    let (service, starts) = file_service(&run_loop);
    let first_deliveries: Deliveries = Arc::default();
    let second_deliveries: Deliveries = Arc::default();

    request_from_workers(&service, &first, 4, &first_deliveries);
    request_from_workers(&service, &second, 4, &second_deliveries);

    timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();

    let mut started = starts.lock().clone();
    started.sort();
    assert_eq!(started, vec![first, second]);
    assert!(first_deliveries
        .lock()
        .iter()
        .all(|(_, r)| r.payload().map(|b| b.as_ref()) == Some(&b"a"[..])));
    assert!(second_deliveries
        .lock()
        .iter()
        .all(|(_, r)| r.payload().map(|b| b.as_ref()) == Some(&b"b"[..])));
}

#[tokio::test]
async fn test_fetch_after_completion_starts_new_episode() {
    let dir = TempDir::new().unwrap();
    let url = write_tile(&dir, "style.json", b"{}");

    let run_loop = RunLoop::new();
    let (service, starts) = file_service(&run_loop);
    let deliveries: Deliveries = Arc::default();

    request_from_workers(&service, &url, 2, &deliveries);
    timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
    request_from_workers(&service, &url, 2, &deliveries);
    timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();

    assert_eq!(starts.lock().len(), 2);
    assert_eq!(deliveries.lock().len(), 4);
}

// =============================================================================
// Errors and cancellation
// =============================================================================

#[tokio::test]
async fn test_missing_file_reaches_every_waiter_as_not_found() {
    let dir = TempDir::new().unwrap();
    let url = file_url(&dir.path().join("absent.pbf"));

    let run_loop = RunLoop::new();
    let (service, _starts) = file_service(&run_loop);
    let deliveries: Deliveries = Arc::default();

    request_from_workers(&service, &url, 3, &deliveries);
    timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();

    let deliveries = deliveries.lock();
    assert_eq!(deliveries.len(), 3);
    for (_, response) in deliveries.iter() {
        assert_eq!(
            response.error_info().map(|e| e.reason),
            Some(ErrorReason::NotFound)
        );
    }
}

#[tokio::test]
async fn test_dropped_handle_receives_nothing() {
    let dir = TempDir::new().unwrap();
    let url = write_tile(&dir, "glyphs.pbf", b"glyphs");

    let run_loop = RunLoop::new();
    let (service, starts) = file_service(&run_loop);
    let delivered = Arc::new(AtomicUsize::new(0));

    let kept = {
        let delivered = Arc::clone(&delivered);
        service
            .coordinator()
            .request(Resource::glyphs(url.clone()), move |_| {
                delivered.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
    };
    let dropped = service
        .coordinator()
        .request(Resource::glyphs(url.clone()), |_| {
            panic!("cancelled request must not be notified")
        })
        .unwrap();
    drop(dropped);

    timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();

    assert_eq!(delivered.load(Ordering::SeqCst), 1);
    assert_eq!(starts.lock().len(), 1);
    assert!(!kept.is_pending());
    assert_eq!(service.coordinator().stats().cancelled, 1);
}

#[tokio::test]
async fn test_unsupported_scheme_is_answered_immediately() {
    let run_loop = RunLoop::new();
    let executor = RoutingFetcher::from_config(
        &HttpFetcherConfig::default(),
        None,
        tokio::runtime::Handle::current(),
    )
    .unwrap();
    let service = FetchService::new(&run_loop.handle(), Box::new(executor)).unwrap();

    let response = Arc::new(Mutex::new(None));
    let handle = {
        let response = Arc::clone(&response);
        service
            .coordinator()
            .request(Resource::style("mapbox://styles/streets"), move |r| {
                *response.lock() = Some(r);
            })
            .unwrap()
    };

    timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
    drop(handle);

    let response = response.lock().take().unwrap();
    let error = response.error_info().unwrap();
    assert_eq!(error.reason, ErrorReason::Other);
    assert_eq!(error.message, "unsupported URL scheme: mapbox");
}

#[tokio::test]
async fn test_stopped_service_rejects_requests() {
    let run_loop = RunLoop::new();
    let (service, starts) = file_service(&run_loop);

    let stopped = service.stop();
    timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
    timeout(LIMIT, stopped).await.unwrap();

    assert!(service
        .coordinator()
        .request(Resource::tile("file:///tmp/x.pbf"), |_| {})
        .is_err());
    assert!(starts.lock().is_empty());
}

// =============================================================================
// Live loop
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_workers_request_while_loop_runs() {
    const WORKERS: usize = 6;

    let dir = TempDir::new().unwrap();
    let url = write_tile(&dir, "live.pbf", b"live");

    let run_loop = RunLoop::new();
    let (service, _starts) = file_service(&run_loop);

    // Holds the loop open until every worker has its answer.
    let done = CompletionSignal::new(&run_loop.handle(), |_: ()| {}).unwrap();
    done.arm();

    let delivered = Arc::new(AtomicUsize::new(0));
    let threads: Vec<_> = (0..WORKERS)
        .map(|_| {
            let coordinator = Arc::clone(service.coordinator());
            let delivered = Arc::clone(&delivered);
            let done = done.clone();
            let url = url.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(5));
                coordinator
                    .request(Resource::tile(url), move |response| {
                        assert_eq!(response.payload().map(|b| b.as_ref()), Some(&b"live"[..]));
                        if delivered.fetch_add(1, Ordering::SeqCst) + 1 == WORKERS {
                            let _ = done.complete(());
                        }
                    })
                    .unwrap()
                    .detach();
            })
        })
        .collect();

    let reason = timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(reason, ExitReason::Idle);
    assert_eq!(delivered.load(Ordering::SeqCst), WORKERS);
    assert_eq!(service.outstanding(), 0);
}
