//! Downloads requirement archives into a fresh staging directory.
//!
//! Downloads are strictly sequential and fail fast: the first object that
//! cannot be fetched aborts the rest. Because the staging directory is owned
//! by a [`StagingDir`] guard, an aborted download leaves nothing behind.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::requirement::RequirementSet;

use super::error::{ManagerError, ManagerResult};
use super::staging::StagingDir;
use super::traits::ObjectStore;

/// Archives fetched into a staging directory.
#[derive(Debug)]
pub struct StagedArchives {
    staging: StagingDir,
    archives: Vec<PathBuf>,
    bytes_downloaded: u64,
}

impl StagedArchives {
    /// The staging directory holding the archives.
    pub fn path(&self) -> &Path {
        self.staging.path()
    }

    /// Staged archive paths, in requirement order.
    pub fn archives(&self) -> &[PathBuf] {
        &self.archives
    }

    /// Total bytes written.
    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes_downloaded
    }
}

/// Fetches archives from an [`ObjectStore`].
pub struct PackageDownloader<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ObjectStore + ?Sized> PackageDownloader<'a, S> {
    /// Create a downloader over `store`.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create `destination` and fetch every requirement into it.
    ///
    /// Fails with [`ManagerError::DirectoryExists`] if `destination` already
    /// exists. On any later failure the directory is removed before the
    /// error is returned.
    pub fn download(
        &self,
        requirements: &RequirementSet,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<StagedArchives> {
        let staging = StagingDir::create(destination)?;
        let mut archives = Vec::with_capacity(requirements.len());
        let mut bytes_downloaded = 0;

        for requirement in requirements {
            if cancel.is_cancelled() {
                return Err(ManagerError::Cancelled);
            }

            let location = requirement.location();
            let object = location.object_path();
            let dest = staging.path().join(location.file_name());

            info!(
                package = %requirement.spec(),
                bucket = self.store.bucket(),
                object = %object,
                "Downloading package"
            );
            bytes_downloaded += self.store.fetch(&object, &dest, cancel)?;
            archives.push(dest);
        }

        Ok(StagedArchives {
            staging,
            archives,
            bytes_downloaded,
        })
    }
}
