//! Settings file for defaults that would otherwise be passed on every run.
//!
//! The file lives at `~/.gs-pip-install/config.ini`:
//!
//! ```ini
//! [storage]
//! bucket = internal-packages
//! project = my-billing-project
//! ; endpoint = http://localhost:9023
//!
//! [install]
//! download_dir = gcs_packages
//! python = python3
//! fallback_python = /home/me/.pyenv/shims/python
//! timeout_secs = 600
//! ```
//!
//! Every key is optional. Command-line flags take precedence.

use std::io;
use std::path::{Path, PathBuf};

use ini::{Ini, Properties};
use thiserror::Error;

/// Directory under the home directory holding the settings file.
pub const CONFIG_DIR_NAME: &str = ".gs-pip-install";

/// Settings file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading the settings file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid INI.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A value has the wrong type.
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    /// No home directory to look for the default file in.
    #[error("cannot determine home directory")]
    NoHomeDirectory,
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    pub bucket: Option<String>,
    pub project: Option<String>,
    pub endpoint: Option<String>,
}

/// `[install]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallSettings {
    pub download_dir: Option<PathBuf>,
    pub python: Option<PathBuf>,
    pub fallback_python: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

/// Parsed settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub storage: StorageSettings,
    pub install: InstallSettings,
}

/// Default settings file path.
pub fn config_file_path() -> Result<PathBuf, ConfigFileError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or(ConfigFileError::NoHomeDirectory)
}

impl ConfigFile {
    /// Load the default settings file. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path()?)
    }

    /// Load settings from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(source) => ConfigFileError::Io {
                path: path.to_path_buf(),
                source,
            },
            ini::Error::Parse(e) => ConfigFileError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            },
        })?;

        Self::from_ini(&ini)
    }

    /// Parse settings from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigFileError::Parse {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("storage")) {
            config.storage.bucket = string_value(section, "bucket");
            config.storage.project = string_value(section, "project");
            config.storage.endpoint = string_value(section, "endpoint");
        }

        if let Some(section) = ini.section(Some("install")) {
            config.install.download_dir = string_value(section, "download_dir").map(PathBuf::from);
            config.install.python = string_value(section, "python").map(PathBuf::from);
            config.install.fallback_python =
                string_value(section, "fallback_python").map(PathBuf::from);
            config.install.timeout_secs = match string_value(section, "timeout_secs") {
                Some(value) => Some(value.parse().map_err(|_| ConfigFileError::InvalidValue {
                    key: "install.timeout_secs".to_string(),
                    value,
                })?),
                None => None,
            };
        }

        Ok(config)
    }
}

/// Non-empty trimmed value for `key`.
fn string_value(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_load_all_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        fs::write(
            &path,
            "[storage]\n\
             bucket = the-shire\n\
             project = fellowship\n\
             \n\
             [install]\n\
             download_dir = /tmp/staging\n\
             python = /usr/bin/python3\n\
             fallback_python = /opt/python/bin/python\n\
             timeout_secs = 120\n",
        )
        .unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.storage.bucket.as_deref(), Some("the-shire"));
        assert_eq!(config.storage.project.as_deref(), Some("fellowship"));
        assert_eq!(config.storage.endpoint, None);
        assert_eq!(
            config.install.download_dir,
            Some(PathBuf::from("/tmp/staging"))
        );
        assert_eq!(config.install.timeout_secs, Some(120));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = ConfigFile::parse("[storage]\nbucket =\n").unwrap();
        assert_eq!(config.storage.bucket, None);
    }

    #[test]
    fn test_invalid_timeout() {
        let err = ConfigFile::parse("[install]\ntimeout_secs = soon\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidValue { .. }));
        assert!(err.to_string().contains("install.timeout_secs"));
    }

    #[test]
    fn test_feeds_manager_config() {
        let config =
            ConfigFile::parse("[install]\npython = python3.12\ntimeout_secs = 0\n").unwrap();
        let manager = crate::manager::ManagerConfig::from_config_file(&config);
        assert_eq!(manager.interpreter, PathBuf::from("python3.12"));
        assert!(manager.install_timeout.is_none());
    }
}
