//! Error types for the package manager.

use std::io;
use std::path::PathBuf;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while fetching and installing bucket packages.
#[derive(Debug)]
pub enum ManagerError {
    /// A requirement or requirements file could not be parsed.
    ParseFailed {
        origin: String,
        line: Option<usize>,
        reason: String,
    },

    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// The staging directory already exists.
    DirectoryExists { path: PathBuf },

    /// The requested object is not present in the bucket.
    ObjectNotFound { bucket: String, object: String },

    /// The credentials in use may not read the object.
    PermissionDenied {
        bucket: String,
        object: String,
        reason: String,
    },

    /// Any other storage read failure.
    FetchFailed {
        bucket: String,
        object: String,
        reason: String,
    },

    /// An operation did not finish in time.
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    /// The bucket argument could not be understood.
    InvalidBucket(String),

    /// The fallback interpreter path needs a home directory and none was found.
    MissingHomeDirectory,

    /// A child process could not be started.
    SpawnFailed { program: String, source: io::Error },

    /// A child process exited unsuccessfully.
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Both the primary and the fallback install attempts failed.
    InstallFailed {
        package: String,
        primary: Box<ManagerError>,
        fallback: Box<ManagerError>,
    },

    /// One or more packages failed to install.
    InstallsFailed {
        failures: Vec<ManagerError>,
        attempted: usize,
    },

    /// The run was cancelled.
    Cancelled,

    /// Invalid configuration.
    InvalidConfig(String),
}

impl ManagerError {
    /// Whether this error represents a user cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParseFailed {
                origin,
                line: Some(line),
                reason,
            } => {
                write!(f, "failed to parse {} (line {}): {}", origin, line, reason)
            }
            Self::ParseFailed {
                origin,
                line: None,
                reason,
            } => {
                write!(f, "failed to parse {}: {}", origin, reason)
            }
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::DirectoryExists { path } => {
                write!(
                    f,
                    "download directory {} already exists; remove it or choose another",
                    path.display()
                )
            }
            Self::ObjectNotFound { bucket, object } => {
                write!(f, "object {} not found in bucket {}", object, bucket)
            }
            Self::PermissionDenied {
                bucket,
                object,
                reason,
            } => {
                write!(
                    f,
                    "permission denied reading {} from bucket {}: {}",
                    object, bucket, reason
                )
            }
            Self::FetchFailed {
                bucket,
                object,
                reason,
            } => {
                write!(
                    f,
                    "failed to fetch {} from bucket {}: {}",
                    object, bucket, reason
                )
            }
            Self::Timeout {
                operation,
                timeout_secs,
            } => {
                write!(f, "{} timed out after {}s", operation, timeout_secs)
            }
            Self::InvalidBucket(msg) => write!(f, "invalid bucket: {}", msg),
            Self::MissingHomeDirectory => write!(
                f,
                "cannot locate the fallback interpreter: home directory is unknown"
            ),
            Self::SpawnFailed { program, source } => {
                write!(f, "failed to run {}: {}", program, source)
            }
            Self::CommandFailed {
                command,
                status,
                stderr,
            } => {
                match status {
                    Some(code) => write!(f, "`{}` exited with status {}", command, code)?,
                    None => write!(f, "`{}` was terminated by a signal", command)?,
                }
                if !stderr.is_empty() {
                    write!(f, ": {}", stderr)?;
                }
                Ok(())
            }
            Self::InstallFailed {
                package,
                primary,
                fallback,
            } => {
                write!(
                    f,
                    "failed to install {}: {} (fallback: {})",
                    package, primary, fallback
                )
            }
            Self::InstallsFailed {
                failures,
                attempted,
            } => {
                write!(
                    f,
                    "{} of {} packages failed to install",
                    failures.len(),
                    attempted
                )?;
                for failure in failures {
                    write!(f, "\n  - {}", failure)?;
                }
                Ok(())
            }
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::SpawnFailed { source, .. } => Some(source),
            Self::InstallFailed { fallback, .. } => Some(fallback.as_ref()),
            _ => None,
        }
    }
}
