//! Fixed-size worker pool draining mailboxes in parallel.

use super::{Mailbox, Scheduler, SchedulerError};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

struct PoolQueue {
    pending: VecDeque<Weak<Mailbox>>,
    shutdown: bool,
}

struct PoolShared {
    queue: Mutex<PoolQueue>,
    available: Condvar,
}

/// Scheduler backed by `N` dedicated worker threads.
///
/// Different mailboxes drain in parallel; the mailbox itself guarantees a
/// single drain at a time. The pool has no timers, so delayed scheduling is
/// rejected.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl ThreadPool {
    /// Spawns `threads` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns the OS error if a worker thread cannot be spawned.
    pub fn new(threads: usize) -> io::Result<Self> {
        let size = threads.max(1);
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(PoolQueue {
                pending: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let shared = Arc::clone(&shared);
            let worker = thread::Builder::new()
                .name(format!("maprelay-worker-{}", index))
                .spawn(move || worker_loop(&shared))?;
            workers.push(worker);
        }

        info!(threads = size, "Actor thread pool started");
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of mailboxes waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.shared.queue.lock().pending.len()
    }

    /// Stops accepting work, lets workers finish what is queued, and joins
    /// them.
    ///
    /// A worker thread calling this does not join itself.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return;
            }
            queue.shutdown = true;
        }
        self.shared.available.notify_all();

        let current = thread::current().id();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                debug!("Actor worker panicked before shutdown");
            }
        }
        debug!("Actor thread pool stopped");
    }
}

impl Scheduler for ThreadPool {
    fn schedule(&self, mailbox: Weak<Mailbox>) -> Result<(), SchedulerError> {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return Err(SchedulerError::ShutDown);
            }
            queue.pending.push_back(mailbox);
        }
        self.shared.available.notify_one();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "thread-pool"
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let mailbox = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(mailbox) = queue.pending.pop_front() {
                    break mailbox;
                }
                if queue.shutdown {
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };
        Mailbox::maybe_receive(&mailbox);
    }
}
