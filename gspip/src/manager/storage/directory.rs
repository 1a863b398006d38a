//! Bucket mirror on the local filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::manager::error::{ManagerError, ManagerResult};
use crate::manager::traits::ObjectStore;

/// Reads objects from a directory that mirrors the bucket layout.
#[derive(Debug, Clone)]
pub struct DirectoryObjectStore {
    root: PathBuf,
    label: String,
}

impl DirectoryObjectStore {
    /// Open a mirror rooted at `root`. The directory must exist.
    pub fn new(root: impl Into<PathBuf>) -> ManagerResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ManagerError::InvalidBucket(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let label = root.display().to_string();
        Ok(Self { root, label })
    }

    /// Root of the mirror.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ObjectStore for DirectoryObjectStore {
    fn bucket(&self) -> &str {
        &self.label
    }

    fn fetch(&self, object: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        let source = self.root.join(object);
        if !source.is_file() {
            return Err(ManagerError::ObjectNotFound {
                bucket: self.label.clone(),
                object: object.to_string(),
            });
        }

        fs::copy(&source, dest).map_err(|e| ManagerError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })
    }
}
