//! Single-threaded cooperative host loop.
//!
//! The host loop is the one execution context the embedding application
//! owns. Everything that has to happen "on the host" (starting fetches,
//! delivering completions, forwarding log records) is funnelled onto it
//! through wake handles.
//!
//! # Architecture
//!
//! ```text
//! worker thread ──wake()──┐
//! worker thread ──wake()──┼──► ready queue ──► RunLoop::run() ──► callback()
//! worker thread ──wake()──┘        (lock)          (one task)
//! ```
//!
//! # Liveness
//!
//! A handle is either *referenced* or not. `run()` returns
//! [`ExitReason::Idle`] as soon as nothing is pending and no referenced
//! handle remains, so a process whose only activity is an idle handle can
//! still terminate.
//!
//! # Teardown
//!
//! Closing a handle is two-phase: [`WakeHandle::close`] marks it closing,
//! and the loop later detaches it, drops its callback and only then runs the
//! teardown continuation (or completes the returned [`Detached`] future).

mod handle;
mod run_loop;
mod state;

pub use handle::{Detached, LoopHandle, WakeHandle};
pub use run_loop::{ExitReason, RunLoop};

use thiserror::Error;

/// Errors reported by the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RunLoopError {
    /// `run()` was called while another task is already driving the loop.
    #[error("run loop is already running")]
    AlreadyRunning,

    /// The loop has been dropped; no more handles can be registered.
    #[error("run loop is closed")]
    Closed,
}
