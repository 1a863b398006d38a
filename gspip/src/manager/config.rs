//! Configuration for a fetch-and-install run.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigFile;

use super::process::DEFAULT_COMMAND_TIMEOUT;

/// Staging directory used when none is given.
pub const DEFAULT_DOWNLOAD_DIR: &str = "gcs_packages";

/// Interpreter used for the first install attempt.
pub const DEFAULT_INTERPRETER: &str = "python3";

/// Fallback interpreter, relative to the home directory.
pub const DEFAULT_FALLBACK_RELATIVE: &str = ".pyenv/shims/python";

/// Default timeout for a single object download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the package manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Staging directory for downloaded archives.
    ///
    /// Created at the start of a run and removed at the end. Must not exist
    /// beforehand.
    pub download_dir: PathBuf,

    /// Isolated install destination.
    ///
    /// `None` installs into the interpreter's active environment with
    /// dependency resolution; `Some` installs with `--no-deps -t`.
    pub target_dir: Option<PathBuf>,

    /// Interpreter for the first install attempt.
    pub interpreter: PathBuf,

    /// Interpreter for the single retry.
    ///
    /// `None` means `$HOME/.pyenv/shims/python`.
    pub fallback_interpreter: Option<PathBuf>,

    /// Timeout for each install invocation. `None` waits indefinitely.
    pub install_timeout: Option<Duration>,

    /// Timeout for each object download.
    pub fetch_timeout: Duration,

    /// Billing project for requester-pays buckets.
    pub project: Option<String>,

    /// Storage API endpoint override.
    pub endpoint: Option<String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_DIR),
            target_dir: None,
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            fallback_interpreter: None,
            install_timeout: Some(DEFAULT_COMMAND_TIMEOUT),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            project: None,
            endpoint: None,
        }
    }
}

impl ManagerConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from the settings file.
    ///
    /// Settings absent from the file keep their defaults.
    pub fn from_config_file(config: &ConfigFile) -> Self {
        let mut manager = Self::default();

        if let Some(dir) = &config.install.download_dir {
            manager.download_dir = dir.clone();
        }
        if let Some(python) = &config.install.python {
            manager.interpreter = python.clone();
        }
        manager.fallback_interpreter = config.install.fallback_python.clone();
        if let Some(secs) = config.install.timeout_secs {
            manager.install_timeout = timeout_from_secs(secs);
        }
        manager.project = config.storage.project.clone();
        manager.endpoint = config.storage.endpoint.clone();

        manager
    }

    /// Set the staging directory.
    pub fn with_download_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.download_dir = path.into();
        self
    }

    /// Set the target directory. An empty path means no target.
    pub fn with_target_dir(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.target_dir = if path.as_os_str().is_empty() {
            None
        } else {
            Some(path)
        };
        self
    }

    /// Set the primary interpreter.
    pub fn with_interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.interpreter = path.into();
        self
    }

    /// Set the fallback interpreter.
    pub fn with_fallback_interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_interpreter = Some(path.into());
        self
    }

    /// Set the install timeout in seconds; zero disables it.
    pub fn with_install_timeout_secs(mut self, secs: u64) -> Self {
        self.install_timeout = timeout_from_secs(secs);
        self
    }

    /// Set the download timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Set the billing project.
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    /// Set the storage endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// The fallback interpreter to retry with.
    ///
    /// Returns `None` when none is configured and the home directory is
    /// unknown; the installer reports that as a missing home directory.
    pub fn resolved_fallback_interpreter(&self) -> Option<PathBuf> {
        self.fallback_interpreter
            .clone()
            .or_else(|| dirs::home_dir().map(|home| home.join(DEFAULT_FALLBACK_RELATIVE)))
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
