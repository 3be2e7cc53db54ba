//! Marshals log records from worker threads onto the host loop.

use super::{LogLevel, LogRecord, LogSink, Logger};
use crate::runloop::{Detached, LoopHandle, RunLoopError};
use crate::work_queue::{WorkQueue, WorkQueueError};
use std::fmt::{self, Arguments};

/// A [`Logger`] whose records are delivered to a [`LogSink`] on the host
/// loop, in the order each producing thread logged them.
///
/// Records below `min_level` are dropped on the producing thread without
/// touching the queue. The forwarder does not keep the loop alive; records
/// queued before the loop goes idle are still delivered.
///
/// Once stopped, further records are discarded.
#[derive(Clone)]
pub struct LoopLogForwarder {
    queue: WorkQueue<LogRecord>,
    min_level: LogLevel,
}

impl LoopLogForwarder {
    /// # Errors
    ///
    /// Returns [`RunLoopError::Closed`] if the loop has been dropped.
    pub fn new(
        handle: &LoopHandle,
        sink: Box<dyn LogSink>,
        min_level: LogLevel,
    ) -> Result<Self, RunLoopError> {
        let mut sink = sink;
        let queue = WorkQueue::new(handle, move |record| sink.record(record))?;
        Ok(Self { queue, min_level })
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Records waiting for the loop.
    pub fn pending(&self) -> usize {
        self.queue.pending_len()
    }

    /// Stops forwarding. Records already queued are discarded.
    pub fn stop(&self) -> Detached {
        self.queue.stop()
    }
}

impl Logger for LoopLogForwarder {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        if level < self.min_level {
            return;
        }
        if let Err(WorkQueueError::Stopped(record)) =
            self.queue.send(LogRecord::capture(level, args))
        {
            tracing::trace!(record = %record, "Log forwarder stopped, record dropped");
        }
    }
}

impl fmt::Debug for LoopLogForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopLogForwarder")
            .field("min_level", &self.min_level)
            .field("pending", &self.pending())
            .field("state", &self.queue.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runloop::RunLoop;
    use crate::{log_debug, log_error, log_info, log_warn};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const LIMIT: Duration = Duration::from_secs(5);

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<(LogRecord, std::thread::ThreadId)>>>);

    impl LogSink for Collect {
        fn record(&mut self, record: LogRecord) {
            self.0.lock().push((record, std::thread::current().id()));
        }
    }

    #[tokio::test]
    async fn test_records_from_workers_reach_sink_in_order() {
        let run_loop = RunLoop::new();
        let collected = Collect::default();
        let forwarder =
            LoopLogForwarder::new(&run_loop.handle(), Box::new(collected.clone()), LogLevel::Trace)
                .unwrap();

        let worker = {
            let forwarder = forwarder.clone();
            std::thread::Builder::new()
                .name("decoder".into())
                .spawn(move || {
                    for i in 0..20 {
                        log_info!(forwarder, "tile {}", i);
                    }
                })
                .unwrap()
        };
        worker.join().unwrap();
        assert_eq!(forwarder.pending(), 20);

        let loop_thread = std::thread::current().id();
        timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();

        let collected = collected.0.lock();
        assert_eq!(collected.len(), 20);
        for (i, (record, thread)) in collected.iter().enumerate() {
            assert_eq!(record.message, format!("tile {}", i));
            assert_eq!(record.thread.as_deref(), Some("decoder"));
            assert_eq!(*thread, loop_thread);
        }
    }

    #[tokio::test]
    async fn test_records_below_min_level_are_dropped() {
        let run_loop = RunLoop::new();
        let collected = Collect::default();
        let forwarder =
            LoopLogForwarder::new(&run_loop.handle(), Box::new(collected.clone()), LogLevel::Warn)
                .unwrap();

        log_debug!(forwarder, "quiet");
        log_info!(forwarder, "quiet");
        log_warn!(forwarder, "loud");
        log_error!(forwarder, "louder");
        assert_eq!(forwarder.pending(), 2);

        timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();

        let levels: Vec<_> = collected.0.lock().iter().map(|(r, _)| r.level).collect();
        assert_eq!(levels, vec![LogLevel::Warn, LogLevel::Error]);
    }

    #[tokio::test]
    async fn test_stopped_forwarder_discards() {
        let run_loop = RunLoop::new();
        let collected = Collect::default();
        let forwarder =
            LoopLogForwarder::new(&run_loop.handle(), Box::new(collected.clone()), LogLevel::Trace)
                .unwrap();

        let detached = forwarder.stop();
        log_error!(forwarder, "after stop");

        timeout(LIMIT, run_loop.run()).await.unwrap().unwrap();
        timeout(LIMIT, detached).await.unwrap();
        assert!(collected.0.lock().is_empty());
    }
}
