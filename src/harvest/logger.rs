//! Structured logging for the harvester.
//!
//! Console output plus an optional daily-rolling log file, both driven by the
//! configured level (overridable with `RUST_LOG`). The returned guard keeps
//! the non-blocking file writer alive for the life of the process.

use std::path::Path;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::harvest::config_loader::AppConfig;

/// Error types for logger setup
#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// Result type for logger setup
pub type LoggerResult<T> = Result<T, LoggerError>;

/// Initializes the tracing subscriber. Returns the file writer guard when
/// file logging is enabled; dropping it flushes and stops the writer.
pub fn init_logging(config: &AppConfig) -> LoggerResult<Option<WorkerGuard>> {
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.log_level))
        .map_err(|e| LoggerError::Init(e.to_string()))?;

    let console_layer = tracing_subscriber::fmt::layer();

    let (file_layer, guard) = if config.logging.log_to_file {
        let log_dir = Path::new(&config.paths.log_directory);
        if !log_dir.exists() {
            std::fs::create_dir_all(log_dir)?;
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, "breed_harvester.log");
        let (writer, guard) = tracing_appender::non_blocking(file_appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggerError::Init(e.to_string()))?;

    Ok(guard)
}
