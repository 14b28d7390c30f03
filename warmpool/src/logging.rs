//! Logging setup for binaries embedding warmpool.
//!
//! The library itself only emits `tracing` events. This module installs a
//! subscriber with:
//! - a log file (cleared on session start) written by a non-blocking appender
//! - optional stdout output
//! - filtering via `RUST_LOG`, defaulting to `info` (`debug` in debug mode)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default log directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "warmpool.log";

/// Where and how to log.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub log_dir: PathBuf,
    pub log_file: String,
    pub stdout: bool,
    pub debug: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            log_file: DEFAULT_LOG_FILE.to_string(),
            stdout: true,
            debug: false,
        }
    }
}

impl LoggingOptions {
    pub fn log_path(&self) -> PathBuf {
        self.log_dir.join(&self.log_file)
    }

    fn default_directive(&self) -> &'static str {
        if self.debug {
            "warmpool=debug,info"
        } else {
            "info"
        }
    }
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Create the log directory and truncate the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> Result<(), io::Error> {
    fs::create_dir_all(log_dir)?;
    fs::write(log_dir.join(log_file), "")
}

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or the log file
/// cannot be cleared.
pub fn init_logging(options: &LoggingOptions) -> Result<LoggingGuard, io::Error> {
    prepare_log_file(&options.log_dir, &options.log_file)?;

    let file_appender = tracing_appender::rolling::never(&options.log_dir, &options.log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = options.stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stdout)
            .with_ansi(true)
            .compact()
    });

    let env_filter = if options.debug {
        EnvFilter::new(options.default_directive())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(options.default_directive()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_options() {
        let options = LoggingOptions::default();
        assert_eq!(options.log_path(), PathBuf::from("logs/warmpool.log"));
        assert!(options.stdout);
        assert_eq!(options.default_directive(), "info");
    }

    #[test]
    fn test_debug_directive() {
        let options = LoggingOptions {
            debug: true,
            ..LoggingOptions::default()
        };
        assert_eq!(options.default_directive(), "warmpool=debug,info");
    }

    // Can't test init_logging because of the global subscriber, but the file
    // preparation is testable on its own.
    #[test]
    fn test_prepare_creates_nested_directory() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("deep/nested");

        prepare_log_file(&log_dir, "test.log").unwrap();

        let log_path = log_dir.join("test.log");
        assert!(log_path.exists());
        assert_eq!(fs::read_to_string(log_path).unwrap(), "");
    }

    #[test]
    fn test_prepare_clears_existing_file() {
        let dir = TempDir::new().unwrap();
        let log_path = dir.path().join("test.log");
        fs::write(&log_path, "old log data").unwrap();

        prepare_log_file(dir.path(), "test.log").unwrap();

        assert_eq!(fs::read_to_string(log_path).unwrap(), "");
    }
}
