//! CLI error handling with user-friendly messages.

use maprelay::config::ConfigFileError;
use maprelay::fetch::FetchError;
use maprelay::runloop::RunLoopError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration file could not be read or written
    Config(ConfigFileError),
    /// Failed to build the tokio runtime
    Runtime(std::io::Error),
    /// Failed to start the worker pool
    WorkerPool(std::io::Error),
    /// Fetch setup failed
    Fetch(FetchError),
    /// The host loop refused to run
    RunLoop(RunLoopError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Config(ConfigFileError::InvalidValue { .. }) = self {
            eprintln!();
            eprintln!("Fix the value in the configuration file, or remove the key to use");
            eprintln!("its default. 'maprelay config path' shows where the file lives.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::WorkerPool(e) => write!(f, "Failed to start worker threads: {}", e),
            CliError::Fetch(e) => write!(f, "Fetch setup failed: {}", e),
            CliError::RunLoop(e) => write!(f, "Host loop error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) | CliError::Runtime(e) | CliError::WorkerPool(e) => Some(e),
            CliError::Config(e) => Some(e),
            CliError::Fetch(e) => Some(e),
            CliError::RunLoop(e) => Some(e),
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<FetchError> for CliError {
    fn from(e: FetchError) -> Self {
        CliError::Fetch(e)
    }
}

impl From<RunLoopError> for CliError {
    fn from(e: RunLoopError) -> Self {
        CliError::RunLoop(e)
    }
}
