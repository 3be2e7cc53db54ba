//! `Ini` → `ConfigFile`. The one place INI key names map to fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::clamp_max_concurrent;
use super::file::ConfigFileError;
use super::settings::ConfigFile;

/// Overlays the values found in `ini` on `ConfigFile::default()`.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("fetch")) {
        if let Some(v) = parse_number::<u64>(section, "fetch", "http_timeout_secs")? {
            if v == 0 {
                return Err(invalid(
                    "fetch",
                    "http_timeout_secs",
                    "0",
                    "must be a positive integer (seconds)",
                ));
            }
            config.fetch.http_timeout_secs = v;
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.fetch.user_agent = v.to_string();
            }
        }
        if let Some(v) = parse_number::<usize>(section, "fetch", "max_concurrent")? {
            config.fetch.max_concurrent = clamp_max_concurrent(v);
        }
    }

    if let Some(section) = ini.section(Some("scheduler")) {
        if let Some(v) = parse_number::<usize>(section, "scheduler", "worker_threads")? {
            if v == 0 {
                return Err(invalid(
                    "scheduler",
                    "worker_threads",
                    "0",
                    "must be a positive integer",
                ));
            }
            config.scheduler.worker_threads = v;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.contains(['/', '\\']) {
                return Err(invalid(
                    "logging",
                    "file",
                    v,
                    "must be a file name, not a path",
                ));
            }
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

/// Reads an optional non-negative integer. Empty values count as unset.
fn parse_number<T: FromStr>(
    section: &Properties,
    name: &str,
    key: &str,
) -> Result<Option<T>, ConfigFileError> {
    let Some(raw) = section.get(key).map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|_| invalid(name, key, raw, "must be a non-negative integer"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
