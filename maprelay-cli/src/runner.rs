//! Common setup shared by commands that do real work.

use crate::error::CliError;
use maprelay::config::ConfigFile;
use maprelay::logging::{init_logging, LoggingGuard};
use std::path::Path;
use tracing::info;

/// Loads configuration and keeps logging alive for the command's lifetime.
pub struct CliRunner {
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Loads `config_path` (or the default file) and initializes logging
    /// from its `[logging]` section.
    pub fn new(config_path: Option<&Path>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(path) => ConfigFile::load_from(path)?,
            None => ConfigFile::load()?,
        };

        let logging_guard = init_logging(&config.logging.directory, &config.logging.file)
            .map_err(CliError::LoggingInit)?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!("maprelay v{}", maprelay::VERSION);
        info!(
            command,
            log_dir = %self.config.logging.directory.display(),
            "maprelay CLI starting"
        );
    }
}
