//! User configuration in `~/.maprelay/config.ini`.
//!
//! | Section       | Key                 | Default                   |
//! |---------------|---------------------|---------------------------|
//! | `[fetch]`     | `http_timeout_secs` | 30                        |
//! |               | `user_agent`        | `maprelay/<version>`      |
//! |               | `max_concurrent`    | 32 (clamped to 1..=256)   |
//! | `[scheduler]` | `worker_threads`    | available parallelism     |
//! | `[logging]`   | `directory`         | `logs`                    |
//! |               | `file`              | `maprelay.log`            |
//!
//! # Example
//!
//! ```
//! use maprelay::config::ConfigFile;
//! use maprelay::fetch::HttpFetcherConfig;
//!
//! let config = ConfigFile::default();
//! let http = HttpFetcherConfig::from(&config.fetch);
//! assert_eq!(http.max_concurrent, 32);
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::{
    default_worker_threads, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_MAX_CONCURRENT_FETCHES,
    MAX_CONCURRENT_FETCHES, MIN_CONCURRENT_FETCHES,
};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{ConfigFile, FetchSettings, LoggingSettings, SchedulerSettings};
