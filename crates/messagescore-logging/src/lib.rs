//! Shared logging setup for the scoring engine's host applications.
//!
//! Provides unified `tracing` setup with file-based daily rotation and
//! environment-based configuration, the same shape the rest of this
//! codebase's applications use so a symbol-scoring worker's logs land
//! alongside everything else's.
//!
//! # Usage
//!
//! ```rust,ignore
//! use messagescore_logging::{LogConfig, init_worker_logging};
//!
//! let config = LogConfig::from_env();
//! let _guard = init_worker_logging(&config);
//!
//! tracing::info!("scoring worker started");
//! ```

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging configuration for a scoring worker process.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Enable logging output.
    pub enabled: bool,
    /// Log level filter (e.g., "info", "messagescore_core=debug").
    pub filter: String,
    /// Directory for log files.
    pub log_dir: PathBuf,
    /// Enable daily log rotation.
    pub rotate_daily: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filter: "info,messagescore_core=debug".to_string(),
            log_dir: PathBuf::from("data/logs"),
            rotate_daily: true,
        }
    }
}

impl LogConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            enabled: true,
            filter: filter.into(),
            ..Default::default()
        }
    }

    /// Create a `LogConfig` from environment variables.
    ///
    /// Reads:
    /// - `MESSAGESCORE_LOG_ENABLED`: set to "1" to enable logging
    /// - `MESSAGESCORE_LOG_FILTER`: log filter string
    /// - `MESSAGESCORE_LOG_DIR`: log directory
    pub fn from_env() -> Self {
        let enabled = std::env::var("MESSAGESCORE_LOG_ENABLED")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let filter = std::env::var("MESSAGESCORE_LOG_FILTER")
            .unwrap_or_else(|_| "info,messagescore_core=debug".to_string());

        let log_dir = std::env::var("MESSAGESCORE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/logs"));

        Self {
            enabled,
            filter,
            log_dir,
            rotate_daily: true,
        }
    }
}

/// Guard that keeps the non-blocking file writer alive.
///
/// Keep this bound for the lifetime of the process; when dropped, buffered
/// log entries are flushed.
pub struct LogGuard {
    _worker_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl LogGuard {
    fn new(worker_guard: Option<tracing_appender::non_blocking::WorkerGuard>) -> Self {
        Self {
            _worker_guard: worker_guard,
        }
    }

    pub fn empty() -> Self {
        Self { _worker_guard: None }
    }
}

fn create_file_appender(config: &LogConfig) -> RollingFileAppender {
    if let Err(e) = std::fs::create_dir_all(&config.log_dir) {
        eprintln!("Warning: failed to create log directory: {}", e);
    }

    let rotation = if config.rotate_daily {
        Rotation::DAILY
    } else {
        Rotation::NEVER
    };

    RollingFileAppender::new(rotation, &config.log_dir, "messagescore.log")
}

fn create_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_new(&config.filter).unwrap_or_else(|e| {
        eprintln!("Warning: invalid log filter '{}': {}", config.filter, e);
        EnvFilter::new("info")
    })
}

/// Initialize logging for a scoring worker (file-only output).
///
/// Returns `None` if logging is disabled.
pub fn init_worker_logging(config: &LogConfig) -> Option<LogGuard> {
    if !config.enabled {
        return None;
    }

    let filter = create_filter(config);
    let file_appender = create_file_appender(config);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(filter);

    tracing_subscriber::registry().with(file_layer).init();

    Some(LogGuard::new(Some(guard)))
}

/// Initialize logging for a short-lived CLI invocation (stderr output).
///
/// Returns `None` if logging is disabled.
pub fn init_cli_logging(config: &LogConfig) -> Option<LogGuard> {
    if !config.enabled {
        return None;
    }

    let filter = create_filter(config);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(true)
        .compact()
        .with_writer(std::io::stderr)
        .with_filter(filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    Some(LogGuard::empty())
}
