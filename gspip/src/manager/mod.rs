//! Package manager for installing Python packages stored in a bucket.
//!
//! # Overview
//!
//! A run copies package archives from object storage into a local staging
//! directory, installs each one with `pip`, and removes the staging directory
//! again:
//!
//! 1. Parse the requirement (single package or requirements file)
//! 2. Locate and download each archive by naming convention
//! 3. Install each archive, retrying once with a fallback interpreter
//! 4. Remove the staging directory, whatever happened before
//!
//! # Architecture
//!
//! The manager uses trait-based abstractions for testability:
//!
//! - [`ObjectStore`] - Fetches archives ([`GcsObjectStore`], [`DirectoryObjectStore`])
//! - [`CommandRunner`] - Runs install commands ([`ProcessRunner`])
//!
//! # Example
//!
//! ```ignore
//! use gspip::manager::{BucketSpec, ManagerConfig, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let config = ManagerConfig::new().with_target_dir("/opt/pkgs");
//! let bucket = BucketSpec::parse("gs://internal-packages")?;
//! let orchestrator = Orchestrator::from_config(&bucket, &config, CancellationToken::new())?;
//!
//! let summary = orchestrator.run("requirements_gcs.txt")?;
//! println!("installed {} packages", summary.installed.len());
//! ```

mod config;
mod download;
mod error;
mod installer;
mod locator;
mod orchestrator;
mod process;
mod staging;
mod storage;
mod traits;

pub use config::{
    ManagerConfig, DEFAULT_DOWNLOAD_DIR, DEFAULT_FALLBACK_RELATIVE, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_INTERPRETER,
};
pub use download::{PackageDownloader, StagedArchives};
pub use error::{ManagerError, ManagerResult};
pub use installer::{
    install_path, InstallAttempt, InstallCommand, InstallOutcome, InstallReport, PackageInstaller,
};
pub use locator::{archive_base_name, ObjectLocation, ARCHIVE_EXTENSION, VERSION_SEPARATOR};
pub use orchestrator::{Orchestrator, RunState, RunSummary};
pub use process::{render_command, ProcessRunner, DEFAULT_COMMAND_TIMEOUT};
pub use staging::StagingDir;
pub use storage::{
    discover_access_token, open_store, AccessToken, BucketSpec, DirectoryObjectStore,
    GcsObjectStore, GcsOptions, ACCESS_TOKEN_ENV, DEFAULT_ENDPOINT, EMULATOR_HOST_ENV,
};
pub use traits::{CommandRunner, ObjectStore};
