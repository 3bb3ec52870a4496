//! Process settings read from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Default location of the general configuration file.
pub const DEFAULT_CONFIG_FILE: &str = "/app/etc/mqtt2elasticsearch.json";

/// Default location of the topic mapping file.
pub const DEFAULT_MAPPING_FILE: &str = "/app/etc/mqtt2elasticsearch-mappings.json";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for the initial document store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection at the retry interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if invalid.
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!(value = %value, "Invalid STORE_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Settings taken from the process environment.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub config_file: PathBuf,
    pub mapping_file: PathBuf,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub log_format: LogFormat,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from(DEFAULT_CONFIG_FILE),
            mapping_file: PathBuf::from(DEFAULT_MAPPING_FILE),
            connection_mode: ConnectionMode::Retry,
            retry_interval: Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS),
            log_format: LogFormat::Pretty,
        }
    }
}

impl RuntimeSettings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CONFIG_FILE`: general configuration file (default: /app/etc/mqtt2elasticsearch.json)
    /// - `ELASTICSEARCH_MAPPING_FILE`: topic mapping file (default: /app/etc/mqtt2elasticsearch-mappings.json)
    /// - `STORE_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `CONNECTION_RETRY_INTERVAL_SECS`: retry interval for broker and store (default: 15)
    /// - `LOG_FORMAT`: "json" for JSON logs, anything else for console output
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let retry_interval = lookup("CONNECTION_RETRY_INTERVAL_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.retry_interval);

        let log_format = match lookup("LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            config_file: lookup("CONFIG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_file),
            mapping_file: lookup("ELASTICSEARCH_MAPPING_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.mapping_file),
            connection_mode: lookup("STORE_CONNECTION_MODE")
                .map(|mode| ConnectionMode::parse(&mode))
                .unwrap_or(defaults.connection_mode),
            retry_interval,
            log_format,
        }
    }
}
