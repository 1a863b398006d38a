//! Scoped staging directory.
//!
//! A [`StagingDir`] owns the directory it created: dropping it removes the
//! directory and everything in it, including while unwinding from a panic.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::{ManagerError, ManagerResult};

/// A transient directory owned by a single run.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    /// Create the directory.
    ///
    /// The parent must already exist. An existing directory is refused with
    /// [`ManagerError::DirectoryExists`] so a run never adopts (and later
    /// deletes) a directory it did not create.
    pub fn create(path: impl Into<PathBuf>) -> ManagerResult<Self> {
        let path = path.into();
        fs::create_dir(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                ManagerError::DirectoryExists { path: path.clone() }
            } else {
                ManagerError::CreateDirFailed {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;
        debug!(path = %path.display(), "Created staging directory");
        Ok(Self { path })
    }

    /// Path of the staging directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed staging directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staging directory"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_drop_removes_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gcs_packages");

        let staging = StagingDir::create(&path).unwrap();
        fs::write(staging.path().join("a.tar.gz"), b"data").unwrap();
        assert!(path.is_dir());

        drop(staging);
        assert!(!path.exists());
    }

    #[test]
    fn test_existing_directory_is_refused_and_left_alone() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gcs_packages");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep.txt"), b"mine").unwrap();

        let err = StagingDir::create(&path).unwrap_err();
        assert!(matches!(err, ManagerError::DirectoryExists { .. }));
        assert!(path.join("keep.txt").exists());
    }

    #[test]
    fn test_missing_parent_is_create_failure() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("gcs_packages");

        let err = StagingDir::create(&path).unwrap_err();
        assert!(matches!(err, ManagerError::CreateDirFailed { .. }));
    }

    #[test]
    fn test_removed_while_unwinding() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("staging");
        let inner = path.clone();

        let result = std::panic::catch_unwind(move || {
            let _staging = StagingDir::create(&inner).unwrap();
            panic!("install blew up");
        });

        assert!(result.is_err());
        assert!(!path.exists());
    }
}
