//! Logging setup for the `geofile` binary.
//!
//! The library only emits `tracing` events. Binaries call [`init_logging`] once:
//! - console output on stderr, so stdout stays clean for command output
//! - optional `geofile.log` in a log directory, cleared on session start
//! - filter taken from `RUST_LOG`, defaulting to `info`

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file name inside the log directory
pub const LOG_FILE_NAME: &str = "geofile.log";

/// Keeps the file writer alive; dropping it flushes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// # Errors
/// Fails if the log directory cannot be created, the log file cannot be
/// cleared, or a global subscriber is already installed.
pub fn init_logging(log_dir: Option<&Path>) -> io::Result<LoggingGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let (file_layer, file_guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            fs::write(dir.join(LOG_FILE_NAME), "")?;

            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
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
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_dir_is_created_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        fs::create_dir_all(&log_dir).unwrap();
        fs::write(log_dir.join(LOG_FILE_NAME), "stale").unwrap();

        // another test in this binary may already own the global subscriber
        let result = init_logging(Some(&log_dir));
        assert!(log_dir.join(LOG_FILE_NAME).exists());
        if result.is_ok() {
            tracing::info!("hello");
        }
        drop(result);

        let contents = fs::read_to_string(log_dir.join(LOG_FILE_NAME)).unwrap();
        assert!(!contents.contains("stale"));
    }
}
