//! Tracing setup for the installer.
//!
//! Everything is written to a diagnostic log file (full error chains
//! included); an optional console layer mirrors warnings for interactive use.

use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// File name of the diagnostic log.
pub const LOG_FILE_NAME: &str = "zetasetup.log";

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory the log file is written to.
    pub log_dir: PathBuf,
    /// Mirror warnings and errors to stderr.
    pub console: bool,
}

impl LoggingConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            console: false,
        }
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Full path of the log file.
    pub fn log_file(&self) -> PathBuf {
        self.log_dir.join(LOG_FILE_NAME)
    }
}

/// Keeps the background log writer alive; flushes pending lines on drop.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    log_file: PathBuf,
}

impl LoggingGuard {
    /// Path of the diagnostic log file.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(config: &LoggingConfig) -> io::Result<LoggingGuard> {
    std::fs::create_dir_all(&config.log_dir)?;

    let appender = tracing_appender::rolling::never(&config.log_dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339())
        .with_thread_names(true)
        .with_target(true);

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(EnvFilter::new("warn"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(LoggingGuard {
        _file_guard: guard,
        log_file: config.log_file(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_paths() {
        let config = LoggingConfig::new("/var/tmp/zs").with_console(true);
        assert!(config.console);
        assert_eq!(config.log_file(), PathBuf::from("/var/tmp/zs/zetasetup.log"));
    }
}
