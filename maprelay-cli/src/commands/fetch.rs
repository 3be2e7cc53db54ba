//! `maprelay fetch`: request URLs from many workers at once.
//!
//! Every worker asks for every URL. The coordinator collapses the
//! duplicates, so each URL is fetched once no matter how many workers
//! there are; the statistics printed at the end show how much was saved.

use clap::Args;
use maprelay::actor::{Actor, ActorRef, Scheduler, ThreadPool};
use maprelay::config::ConfigFile;
use maprelay::fetch::{
    FetchCoordinator, FetchService, HttpFetcherConfig, RequestHandle, RoutingFetcher,
};
use maprelay::log::{LogLevel, Logger, LoopLogForwarder, TracingLogger};
use maprelay::resource::{Outcome, Resource, ResourceKind, Response};
use maprelay::runloop::RunLoop;
use maprelay::work_queue::{CompletionSignal, WorkQueue};
use maprelay::{log_debug, log_warn};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::CliError;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// URLs to fetch (file://, asset://, http://, https://)
    #[arg(required = true)]
    urls: Vec<String>,

    /// Resource kind of every URL
    #[arg(long, default_value = "tile")]
    kind: ResourceKind,

    /// Worker count (default: scheduler.worker_threads from config)
    #[arg(long)]
    workers: Option<usize>,

    /// Directory that asset:// URLs resolve against
    #[arg(long)]
    asset_root: Option<PathBuf>,
}

/// What one worker saw, handed to the host loop when it is done.
struct WorkerReport {
    worker: usize,
    lines: Vec<String>,
}

/// A worker actor: requests every URL and collects the answers.
struct Worker {
    id: usize,
    this: ActorRef<Worker>,
    remaining: usize,
    lines: Vec<String>,
    handles: Vec<RequestHandle>,
    reports: WorkQueue<WorkerReport>,
    logger: LoopLogForwarder,
}

impl Worker {
    fn start(
        &mut self,
        coordinator: &Arc<FetchCoordinator>,
        urls: &[String],
        kind: ResourceKind,
    ) {
        self.remaining = urls.len();
        for url in urls {
            let this = self.this.clone();
            let reply_url = url.clone();
            let resource = Resource::new(url.clone(), kind);
            let requested = coordinator.request(resource, move |response| {
                this.invoke(move |worker| worker.received(reply_url, &response));
            });
            match requested {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    log_warn!(
                        self.logger,
                        "worker {}: {} not requested: {}",
                        self.id,
                        url,
                        e
                    );
                    self.finish_one(format!("{}: not requested ({})", url, e));
                }
            }
        }
    }

    fn received(&mut self, url: String, response: &Response) {
        log_debug!(self.logger, "worker {} received {}", self.id, url);
        self.finish_one(format!("{}: {}", url, describe(response)));
    }

    fn finish_one(&mut self, line: String) {
        self.lines.push(line);
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining > 0 {
            return;
        }
        // Everything has answered; the handles have nothing left to cancel.
        self.handles.clear();
        let report = WorkerReport {
            worker: self.id,
            lines: std::mem::take(&mut self.lines),
        };
        if self.reports.send(report).is_err() {
            log_warn!(self.logger, "worker {}: report queue closed", self.id);
        }
    }
}

fn describe(response: &Response) -> String {
    match &response.outcome {
        Outcome::Data(bytes) => format!("{} bytes", bytes.len()),
        Outcome::NoContent => "no content".to_string(),
        Outcome::NotModified => "not modified".to_string(),
        Outcome::Error(error) => format!("{} ({})", error.reason, error.message),
    }
}

/// Runs the fetch command on a fresh tokio runtime.
pub fn run(args: FetchArgs, config: &ConfigFile) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("maprelay-io")
        .build()
        .map_err(CliError::Runtime)?;
    runtime.block_on(fetch_all(args, config))
}

async fn fetch_all(args: FetchArgs, config: &ConfigFile) -> Result<(), CliError> {
    let workers = args
        .workers
        .unwrap_or(config.scheduler.worker_threads)
        .max(1);
    info!(
        urls = args.urls.len(),
        workers,
        kind = %args.kind,
        "Fetching"
    );

    let run_loop = RunLoop::new();
    let handle = run_loop.handle();

    let executor = RoutingFetcher::from_config(
        &HttpFetcherConfig::from(&config.fetch),
        args.asset_root.clone(),
        tokio::runtime::Handle::current(),
    )?;
    let service = FetchService::new(&handle, Box::new(executor))?;
    let logger = LoopLogForwarder::new(&handle, Box::new(TracingLogger), LogLevel::Debug)?;

    // Held until the last worker has reported.
    let all_reported = CompletionSignal::new(&handle, |_: ()| {})?;
    all_reported.arm();

    let reports = {
        let all_reported = all_reported.clone();
        let mut outstanding = workers;
        WorkQueue::new(&handle, move |report: WorkerReport| {
            for line in &report.lines {
                println!("[worker {}] {}", report.worker, line);
            }
            outstanding -= 1;
            if outstanding == 0 {
                let _ = all_reported.complete(());
            }
        })?
    };

    let pool = ThreadPool::new(config.scheduler.worker_threads).map_err(CliError::WorkerPool)?;
    let pool: Arc<dyn Scheduler> = Arc::new(pool);
    let actors: Vec<Actor<Worker>> = (0..workers)
        .map(|id| {
            let reports = reports.clone();
            let logger = logger.clone();
            Actor::with_self(Arc::clone(&pool), move |this| Worker {
                id,
                this,
                remaining: 0,
                lines: Vec::new(),
                handles: Vec::new(),
                reports,
                logger,
            })
        })
        .collect();

    let urls = Arc::new(args.urls);
    for actor in &actors {
        let coordinator = Arc::clone(service.coordinator());
        let urls = Arc::clone(&urls);
        let kind = args.kind;
        actor
            .self_ref()
            .invoke(move |worker| worker.start(&coordinator, &urls, kind));
    }

    run_loop.run().await?;

    let stats = service.coordinator().stats();
    println!();
    println!(
        "{} requests, {} fetches, {} coalesced ({:.1}%)",
        stats.total_requests,
        stats.new_fetches,
        stats.coalesced_requests,
        stats.coalescing_ratio() * 100.0
    );
    service.coordinator().log_stats();

    drop(actors);
    let service_stopped = service.stop();
    let logger_stopped = logger.stop();
    let reports_stopped = reports.stop();
    let signal_stopped = all_reported.stop();
    run_loop.run().await?;
    service_stopped.await;
    logger_stopped.await;
    reports_stopped.await;
    signal_stopped.await;

    Ok(())
}
