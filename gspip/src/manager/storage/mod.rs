//! Object-storage backends for fetching package archives.
//!
//! - [`GcsObjectStore`] reads from Google Cloud Storage over the JSON API.
//! - [`DirectoryObjectStore`] reads from a local directory that mirrors the
//!   bucket layout (for example a `gsutil rsync` copy or a FUSE mount).
//!
//! [`BucketSpec`] decides which backend a bucket argument refers to:
//!
//! ```text
//! my-bucket              -> GCS bucket "my-bucket"
//! gs://my-bucket         -> GCS bucket "my-bucket"
//! file:///srv/mirror     -> directory /srv/mirror
//! ```

mod directory;
mod gcs;
mod token;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use directory::DirectoryObjectStore;
pub use gcs::{GcsObjectStore, GcsOptions, DEFAULT_ENDPOINT, EMULATOR_HOST_ENV};
pub use token::{discover_access_token, AccessToken, ACCESS_TOKEN_ENV};

use super::config::ManagerConfig;
use super::error::{ManagerError, ManagerResult};
use super::traits::ObjectStore;

const GCS_SCHEME: &str = "gs://";
const FILE_SCHEME: &str = "file://";

/// A parsed bucket argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketSpec {
    /// A Google Cloud Storage bucket name.
    Gcs(String),
    /// A local directory laid out like a bucket.
    Directory(PathBuf),
}

impl BucketSpec {
    /// Parse a bucket argument.
    pub fn parse(input: &str) -> ManagerResult<Self> {
        let input = input.trim();

        if let Some(path) = input.strip_prefix(FILE_SCHEME) {
            if path.is_empty() {
                return Err(ManagerError::InvalidBucket(format!(
                    "'{}' has no directory path",
                    input
                )));
            }
            return Ok(Self::Directory(PathBuf::from(path)));
        }

        let name = input.strip_prefix(GCS_SCHEME).unwrap_or(input);
        let name = name.trim_end_matches('/');
        if name.is_empty() {
            return Err(ManagerError::InvalidBucket(
                "bucket name is empty".to_string(),
            ));
        }
        if name.contains('/') {
            return Err(ManagerError::InvalidBucket(format!(
                "'{}' is not a bucket name; object prefixes are not supported",
                input
            )));
        }
        Ok(Self::Gcs(name.to_string()))
    }
}

impl FromStr for BucketSpec {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for BucketSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gcs(name) => write!(f, "{}{}", GCS_SCHEME, name),
            Self::Directory(path) => write!(f, "{}{}", FILE_SCHEME, path.display()),
        }
    }
}

/// Open the store a bucket argument refers to.
pub fn open_store(
    spec: &BucketSpec,
    config: &ManagerConfig,
) -> ManagerResult<Box<dyn ObjectStore>> {
    match spec {
        BucketSpec::Gcs(name) => {
            let options = GcsOptions::from_manager_config(config);
            Ok(Box::new(GcsObjectStore::new(name.clone(), options)?))
        }
        BucketSpec::Directory(path) => Ok(Box::new(DirectoryObjectStore::new(path.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_bucket_name() {
        assert_eq!(
            BucketSpec::parse("the-shire").unwrap(),
            BucketSpec::Gcs("the-shire".to_string())
        );
    }

    #[test]
    fn test_parse_gs_url() {
        assert_eq!(
            BucketSpec::parse("gs://the-shire/").unwrap(),
            BucketSpec::Gcs("the-shire".to_string())
        );
    }

    #[test]
    fn test_parse_file_url() {
        assert_eq!(
            BucketSpec::parse("file:///srv/mirror").unwrap(),
            BucketSpec::Directory(PathBuf::from("/srv/mirror"))
        );
    }

    #[test]
    fn test_parse_rejects_empty_and_prefixed_names() {
        assert!(BucketSpec::parse("").is_err());
        assert!(BucketSpec::parse("gs://").is_err());
        assert!(BucketSpec::parse("file://").is_err());
        assert!(BucketSpec::parse("gs://bucket/prefix").is_err());
    }

    #[test]
    fn test_display_round_trips_scheme() {
        assert_eq!(
            BucketSpec::Gcs("b".to_string()).to_string(),
            "gs://b".to_string()
        );
    }

    #[test]
    fn test_open_store_for_directory_bucket() {
        let mirror = tempfile::TempDir::new().unwrap();
        let spec = BucketSpec::Directory(mirror.path().to_path_buf());

        let store = open_store(&spec, &ManagerConfig::new()).unwrap();
        assert_eq!(store.bucket(), mirror.path().display().to_string());

        let missing = BucketSpec::Directory(mirror.path().join("absent"));
        let err = open_store(&missing, &ManagerConfig::new()).err().unwrap();
        assert!(matches!(err, ManagerError::InvalidBucket(_)));
    }
}
