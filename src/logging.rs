//! # Logging Module
//!
//! Sets up the global tracing subscriber:
//! - Console output on stdout
//! - Optional plain-text log file (`track-relay.log.YYYY-MM-DD`, rotated daily)
//! - Level filtering via `RUST_LOG`, defaulting to `info`

use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Log file prefix inside the configured log directory; the date is appended
pub const LOG_FILE_NAME: &str = "track-relay.log";

/// Keeps the file writer alive; dropping it flushes the log file
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging
///
/// # Arguments
///
/// * `log_dir` - Directory for the log file, or `None` for console only
///
/// # Errors
///
/// Returns error if the log directory cannot be created
pub fn init_logging(log_dir: Option<&str>) -> Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Log directory from configuration; empty means console only
pub fn log_dir_from_config(log_dir: &str) -> Option<&str> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
