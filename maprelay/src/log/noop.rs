//! Discarding logger and sink.

use crate::log::{LogLevel, LogRecord, LogSink, Logger};
use std::fmt::Arguments;

/// Drops everything. Handy in tests and benchmarks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn log(&self, _level: LogLevel, _args: Arguments<'_>) {}
}

impl LogSink for NoOpLogger {
    #[inline]
    fn record(&mut self, _record: LogRecord) {}
}
