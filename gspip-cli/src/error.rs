//! CLI error type and exit codes.

use std::fmt;

use gspip::config::ConfigFileError;
use gspip::logging::LoggingError;
use gspip::manager::ManagerError;

/// Exit code for a run interrupted by Ctrl-C.
pub const EXIT_CANCELLED: u8 = 130;

/// Exit code for any other failure.
pub const EXIT_FAILURE: u8 = 1;

/// Errors surfaced to the user.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or missing command-line settings.
    Config(String),
    /// The settings file could not be loaded.
    ConfigFile(ConfigFileError),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The run itself failed.
    Manager(ManagerError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Manager(e) if e.is_cancelled() => EXIT_CANCELLED,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Settings file error: {}", e),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Manager(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::ConfigFile(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Manager(e) => Some(e),
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        CliError::Manager(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_exit_code() {
        let err = CliError::from(ManagerError::Cancelled);
        assert_eq!(err.exit_code(), EXIT_CANCELLED);
    }

    #[test]
    fn test_other_errors_exit_failure() {
        assert_eq!(
            CliError::Config("no bucket".to_string()).exit_code(),
            EXIT_FAILURE
        );
        assert_eq!(
            CliError::from(ManagerError::MissingHomeDirectory).exit_code(),
            EXIT_FAILURE
        );
    }

    #[test]
    fn test_manager_message_is_unwrapped() {
        let err = CliError::from(ManagerError::InvalidBucket("''".to_string()));
        assert_eq!(
            err.to_string(),
            ManagerError::InvalidBucket("''".to_string()).to_string()
        );
    }
}
