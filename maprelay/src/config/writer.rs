//! `ConfigFile` → commented INI text, as written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;

pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[fetch]
; Timeout in seconds for a single HTTP request (default: 30)
http_timeout_secs = {}
; User-Agent header sent with every HTTP request
user_agent = {}
; Maximum simultaneous HTTP requests (default: 32, clamped to 1-256)
; Requests beyond this wait for a free slot
max_concurrent = {}

[scheduler]
; Threads in the actor worker pool (default: number of CPU cores)
worker_threads = {}

[logging]
; Directory for the log file, created if missing (default: logs)
directory = {}
; Log file name, truncated at start-up (default: maprelay.log)
file = {}
"#,
        config.fetch.http_timeout_secs,
        config.fetch.user_agent,
        config.fetch.max_concurrent,
        config.scheduler.worker_threads,
        path_to_string(&config.logging.directory),
        config.logging.file,
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}
