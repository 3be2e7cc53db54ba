//! Default values and the `ConfigFile::default()` implementation.

use super::settings::{ConfigFile, FetchSettings, LoggingSettings, SchedulerSettings};
use crate::fetch::DEFAULT_USER_AGENT;
use crate::logging::{DEFAULT_LOG_DIR, DEFAULT_LOG_FILE};
use std::path::PathBuf;

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 32;
pub const MIN_CONCURRENT_FETCHES: usize = 1;
pub const MAX_CONCURRENT_FETCHES: usize = 256;

/// One worker per available core, or one if that cannot be determined.
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Clamps fetch concurrency into range, warning when the value changes.
pub(super) fn clamp_max_concurrent(value: usize) -> usize {
    let clamped = value.clamp(MIN_CONCURRENT_FETCHES, MAX_CONCURRENT_FETCHES);
    if clamped != value {
        tracing::warn!(
            requested = value,
            min = MIN_CONCURRENT_FETCHES,
            max = MAX_CONCURRENT_FETCHES,
            "max_concurrent out of range, clamping to {}",
            clamped
        );
    }
    clamped
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIR),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            fetch: FetchSettings::default(),
            scheduler: SchedulerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_max_concurrent() {
        assert_eq!(clamp_max_concurrent(0), 1);
        assert_eq!(clamp_max_concurrent(16), 16);
        assert_eq!(clamp_max_concurrent(10_000), 256);
    }

    #[test]
    fn test_default_worker_threads_is_positive() {
        assert!(default_worker_threads() >= 1);
    }
}
