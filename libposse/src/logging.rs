//! Logging setup for the posse binary
//!
//! Logs go to stderr so stdout stays free for the run summary (and for
//! `--format json`, which must be parseable on its own).
//!
//! # Examples
//!
//! ```no_run
//! use libposse::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//!
//! // Or honour POSSE_LOG_FORMAT / POSSE_LOG_LEVEL
//! libposse::logging::init_default(false);
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const ENV_LOG_FORMAT: &str = "POSSE_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "POSSE_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain lines, no colors
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line with colors
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// * `level` - Minimum log level (error, warn, info, debug, trace)
    /// * `verbose` - Forces debug level unless `RUST_LOG` says otherwise
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    fn filter(&self) -> EnvFilter {
        let level = if self.verbose { "debug" } else { self.level.as_str() };
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }

    /// Install the global subscriber. A second call is a no-op.
    pub fn init(&self) {
        let filter = self.filter();

        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true)
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("logging already initialized");
        }
    }
}

/// Read the format and level from the environment, falling back to text at
/// info level.
pub fn config_from_env<F>(lookup: F, verbose: bool) -> LoggingConfig
where
    F: Fn(&str) -> Option<String>,
{
    let format = lookup(ENV_LOG_FORMAT)
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = lookup(ENV_LOG_LEVEL)
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());

    LoggingConfig::new(format, level, verbose)
}

/// Initialize logging from `POSSE_LOG_FORMAT` and `POSSE_LOG_LEVEL`.
pub fn init_default(verbose: bool) {
    config_from_env(|key| std::env::var(key).ok(), verbose).init();
}
