//! Logging setup.
//!
//! The server logs to the console and appends the same events to a log
//! file. `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

/// Keeps the log file open; flushes it to disk when dropped.
#[must_use = "dropping the guard flushes and releases the log file"]
pub struct LogGuard {
    file: Option<Arc<File>>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.sync_all();
        }
    }
}

#[derive(Debug)]
pub enum LoggingError {
    File(PathBuf, io::Error),
    Filter(ParseError),
    Init(TryInitError),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::File(path, e) => {
                write!(f, "Failed to open log file '{}': {}", path.display(), e)
            }
            LoggingError::Filter(e) => write!(f, "Invalid log level: {e}"),
            LoggingError::Init(e) => write!(f, "Failed to install logger: {e}"),
        }
    }
}

impl std::error::Error for LoggingError {}

fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(LoggingError::Filter)
}

/// Install the console + file logger for the rest of the process.
pub fn init(config: &LoggingConfig) -> Result<LogGuard, LoggingError> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.file)
        .map_err(|e| LoggingError::File(config.file.clone(), e))?;
    let file = Arc::new(file);

    tracing_subscriber::registry()
        .with(env_filter(&config.level)?)
        .with(tracing_fmt::layer().with_target(false))
        .with(
            tracing_fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::clone(&file)),
        )
        .try_init()
        .map_err(LoggingError::Init)?;

    Ok(LogGuard { file: Some(file) })
}

/// Install a console-only logger, used by the interactive client.
pub fn init_console(level: &str) -> Result<LogGuard, LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_target(false)
        .with_writer(io::stderr)
        .finish()
        .try_init()
        .map_err(LoggingError::Init)?;

    Ok(LogGuard { file: None })
}

/// Thread-scoped logger that records formatted events in memory.
#[cfg(test)]
pub(crate) mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::subscriber::DefaultGuard;

    #[derive(Clone, Default)]
    pub(crate) struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Capture every event emitted on this thread until the guard drops.
    ///
    /// Use with a current-thread runtime so spawned tasks are captured too.
    pub(crate) fn start() -> (DefaultGuard, CapturedLogs) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_target(false)
            .with_writer(move || writer.clone())
            .finish();
        (tracing::subscriber::set_default(subscriber), logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_rejected() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(matches!(
            env_filter("hola_echo=loud"),
            Err(LoggingError::Filter(_))
        ));
    }

    #[test]
    fn test_unwritable_log_file() {
        let config = LoggingConfig {
            level: "info".to_string(),
            file: PathBuf::from("/nonexistent-dir/hola-echo/tcp_server.log"),
        };
        assert!(matches!(init(&config), Err(LoggingError::File(_, _))));
    }

    #[test]
    fn test_file_receives_events() {
        let path = std::env::temp_dir().join(format!("hola-echo-{}.log", std::process::id()));
        let config = LoggingConfig {
            level: "info".to_string(),
            file: path.clone(),
        };

        let guard = init(&config).unwrap();
        tracing::error!(marker = "file-sink-check", "Logging test event");
        drop(guard);

        let contents = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(contents.contains("file-sink-check"));
    }
}
