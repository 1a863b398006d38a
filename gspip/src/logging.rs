//! Tracing subscriber setup.
//!
//! Events go to stderr through a `fmt` layer. `RUST_LOG` overrides the
//! verbosity chosen on the command line. An optional log file receives the
//! same events without ANSI colors through a non-blocking writer; keep the
//! returned [`LoggingGuard`] alive until exit so buffered lines are flushed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Crate targets that follow the verbosity level. Everything else stays at `warn`.
const CRATE_TARGETS: &[&str] = &["gspip", "gs_pip_install"];

/// Logging options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for this crate's own events.
    pub level: Level,
    /// Also append events to this file.
    pub log_file: Option<PathBuf>,
    /// Colorize stderr output.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_file: None,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Map `-v`/`-q` counts onto a level.
    ///
    /// `quiet` wins over `verbose`. One `-v` is debug, two or more is trace.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Self {
        let level = if quiet {
            Level::ERROR
        } else {
            match verbose {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };
        Self {
            level,
            ..Self::default()
        }
    }

    /// Set the log file.
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// Set ANSI coloring for stderr.
    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi = ansi;
        self
    }

    /// Default filter directives when `RUST_LOG` is unset.
    pub fn default_directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let mut directives = String::from("warn");
        for target in CRATE_TARGETS {
            directives.push_str(&format!(",{}={}", target, level));
        }
        directives
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(self.default_directives()))
            .unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Keeps the file writer flushing until dropped.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Errors installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log file path: {0}")]
    InvalidLogFile(PathBuf),

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(config.ansi)
        .with_target(false)
        .with_filter(config.filter());

    let (file_layer, file_guard) = match &config.log_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(config.filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: file_guard })
}

fn file_writer(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidLogFile(path.to_path_buf()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory).map_err(|source| LoggingError::CreateDir {
        path: directory.clone(),
        source,
    })?;

    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LoggingConfig::from_verbosity(0, false).level, Level::INFO);
        assert_eq!(LoggingConfig::from_verbosity(1, false).level, Level::DEBUG);
        assert_eq!(LoggingConfig::from_verbosity(3, false).level, Level::TRACE);
        assert_eq!(LoggingConfig::from_verbosity(2, true).level, Level::ERROR);
    }

    #[test]
    fn test_default_directives() {
        let config = LoggingConfig::from_verbosity(1, false);
        assert_eq!(
            config.default_directives(),
            "warn,gspip=debug,gs_pip_install=debug"
        );
    }

    #[test]
    fn test_directives_parse() {
        let config = LoggingConfig::default();
        assert!(EnvFilter::try_new(config.default_directives()).is_ok());
    }

    #[test]
    fn test_file_writer_rejects_bare_root() {
        let err = file_writer(Path::new("/")).unwrap_err();
        assert!(matches!(err, LoggingError::InvalidLogFile(_)));
    }
}
