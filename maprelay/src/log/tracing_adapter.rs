//! Bridge into the `tracing` ecosystem.

use crate::log::{LogLevel, LogRecord, LogSink, Logger};
use std::fmt::Arguments;

/// Emits log calls and forwarded records as `tracing` events.
///
/// Forwarded records keep the name of the thread that produced them in an
/// `origin` field, since the event itself is emitted on the host loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, args: Arguments<'_>) {
        match level {
            LogLevel::Trace => tracing::trace!("{}", args),
            LogLevel::Debug => tracing::debug!("{}", args),
            LogLevel::Info => tracing::info!("{}", args),
            LogLevel::Warn => tracing::warn!("{}", args),
            LogLevel::Error => tracing::error!("{}", args),
        }
    }
}

impl LogSink for TracingLogger {
    fn record(&mut self, record: LogRecord) {
        let origin = record.thread.as_deref().unwrap_or("unnamed");
        let message = record.message.as_str();
        match record.level {
            LogLevel::Trace => tracing::trace!(origin, "{}", message),
            LogLevel::Debug => tracing::debug!(origin, "{}", message),
            LogLevel::Info => tracing::info!(origin, "{}", message),
            LogLevel::Warn => tracing::warn!(origin, "{}", message),
            LogLevel::Error => tracing::error!(origin, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TracingLogger>();
    }

    #[test]
    fn test_sink_accepts_every_level() {
        let mut sink = TracingLogger;
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            sink.record(LogRecord::capture(level, format_args!("level {}", level)));
        }
    }
}
