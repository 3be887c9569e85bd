//! Tracing setup for mediagate
//!
//! Console output at the operator's chosen level, plus a full trace of the
//! current run on disk.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Name of the per-run log file inside the logs directory.
pub const LOG_FILE_NAME: &str = "mediagate-last-run.log";

/// Initialize tracing with a console layer and a trace-level file layer.
///
/// `RUST_LOG` overrides `console_level` for the console only. The log file
/// is truncated on every start.
///
/// # Errors
/// - `std::io::Error` - If the logs directory or file cannot be created, or
///   a global subscriber is already installed
pub fn init_tracing(console_level: Level, logs_dir: &Path) -> Result<PathBuf, std::io::Error> {
    create_dir_all(logs_dir)?;
    let log_file_path = logs_dir.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(std::io::Error::other)?;

    tracing::info!(
        "Tracing initialized: console={}, trace_file={}",
        console_level,
        log_file_path.display()
    );
    Ok(log_file_path)
}

/// Console verbosity selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl CliLogLevel {
    /// Converts to the matching `tracing::Level`.
    ///
    /// # Examples
    /// ```
    /// use mediagate_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Warn.as_tracing_level(), tracing::Level::WARN);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::ValueEnum;

    use super::*;

    #[test]
    fn test_log_level_names() {
        let level = CliLogLevel::from_str("debug", true).unwrap();
        assert_eq!(level.as_tracing_level(), Level::DEBUG);
        assert!(CliLogLevel::from_str("verbose", true).is_err());
    }
}
