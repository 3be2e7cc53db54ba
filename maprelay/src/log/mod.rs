//! Log forwarding from worker threads to the host loop.
//!
//! Worker threads log through a [`Logger`]. The [`LoopLogForwarder`] turns
//! each call into a [`LogRecord`] and marshals it onto the host loop through
//! a work queue, where a [`LogSink`] consumes the records in order. Hosts
//! that own their own log pipeline plug in a sink; everyone else uses
//! [`TracingLogger`].
//!
//! ```
//! use maprelay::log::{LogLevel, Logger, LoopLogForwarder, TracingLogger};
//! use maprelay::log_info;
//! use maprelay::runloop::RunLoop;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let run_loop = RunLoop::new();
//! let forwarder =
//!     LoopLogForwarder::new(&run_loop.handle(), Box::new(TracingLogger), LogLevel::Info).unwrap();
//!
//! let worker = forwarder.clone();
//! std::thread::spawn(move || log_info!(worker, "tile {} parsed", 7))
//!     .join()
//!     .unwrap();
//!
//! run_loop.run().await.unwrap();
//! # });
//! ```

mod forwarder;
mod noop;
mod tracing_adapter;
mod r#trait;

pub use forwarder::LoopLogForwarder;
pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, LogRecord, LogSink, Logger};
pub use tracing_adapter::TracingLogger;
