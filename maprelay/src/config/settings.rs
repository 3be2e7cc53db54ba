//! Settings structs, one per `[section]` of the INI file.

use crate::fetch::HttpFetcherConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration loaded from `config.ini`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub fetch: FetchSettings,
    pub scheduler: SchedulerSettings,
    pub logging: LoggingSettings,
}

/// `[fetch]`: HTTP executor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Per-request timeout in seconds.
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// Simultaneous HTTP requests.
    pub max_concurrent: usize,
}

/// `[scheduler]`: actor worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub worker_threads: usize,
}

/// `[logging]`: log file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl From<&FetchSettings> for HttpFetcherConfig {
    fn from(settings: &FetchSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.http_timeout_secs),
            user_agent: settings.user_agent.clone(),
            max_concurrent: settings.max_concurrent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_from_fetch_settings() {
        let settings = FetchSettings {
            http_timeout_secs: 5,
            user_agent: "tiles/1.0".to_string(),
            max_concurrent: 8,
        };

        let http = HttpFetcherConfig::from(&settings);
        assert_eq!(http.timeout, Duration::from_secs(5));
        assert_eq!(http.user_agent, "tiles/1.0");
        assert_eq!(http.max_concurrent, 8);
    }

    #[test]
    fn test_defaults_match_http_fetcher_defaults() {
        let http = HttpFetcherConfig::from(&FetchSettings::default());
        assert_eq!(http, HttpFetcherConfig::default());
    }
}
