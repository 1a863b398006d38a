//! Sequences parse, download, install, and cleanup for one run.
//!
//! ```text
//! Init ──► Parsed ──► Downloaded ──► Installed ──► Cleaned
//!            │            │              │            ▲
//!            └────────────┴──────────────┴── error ───┘
//! ```
//!
//! The staging directory is owned by a guard created during download, so it
//! is removed on every path out of the run once it exists. A failure to create
//! it (for example because it already exists) leaves nothing to clean up.

use std::fmt;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::requirement::{parse_requirements, ParsedRequirements};

use super::config::ManagerConfig;
use super::download::PackageDownloader;
use super::error::ManagerResult;
use super::installer::PackageInstaller;
use super::process::ProcessRunner;
use super::storage::{open_store, BucketSpec};
use super::traits::{CommandRunner, ObjectStore};

/// Stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has happened yet.
    Init,
    /// Requirements were parsed.
    Parsed,
    /// Every archive is staged.
    Downloaded,
    /// Every staged archive has an install outcome.
    Installed,
    /// The staging directory is gone.
    Cleaned,
}

impl RunState {
    /// Get a human-readable name for the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Parsed => "parsed",
            Self::Downloaded => "downloaded",
            Self::Installed => "installed",
            Self::Cleaned => "cleaned",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Requirements parsed from the input.
    pub requirements: usize,
    /// Bytes fetched from the bucket.
    pub bytes_downloaded: u64,
    /// Archives installed, in install order.
    pub installed: Vec<String>,
    /// Installs that needed the fallback interpreter.
    pub fallbacks: usize,
}

/// Runs the fetch-and-install workflow.
pub struct Orchestrator<S: ObjectStore, R: CommandRunner> {
    store: S,
    installer: PackageInstaller<R>,
    download_dir: PathBuf,
    cancel: CancellationToken,
}

impl Orchestrator<Box<dyn ObjectStore>, ProcessRunner> {
    /// Build a production orchestrator for `bucket`.
    pub fn from_config(
        bucket: &BucketSpec,
        config: &ManagerConfig,
        cancel: CancellationToken,
    ) -> ManagerResult<Self> {
        let store = open_store(bucket, config)?;
        let runner = ProcessRunner::new().with_timeout(config.install_timeout);
        let installer = PackageInstaller::new(runner, config.interpreter.clone())
            .with_fallback_interpreter(config.resolved_fallback_interpreter())
            .with_target_dir(config.target_dir.clone());

        Ok(Self::new(store, installer, config.download_dir.clone(), cancel))
    }
}

impl<S: ObjectStore, R: CommandRunner> Orchestrator<S, R> {
    /// Assemble an orchestrator from its parts.
    pub fn new(
        store: S,
        installer: PackageInstaller<R>,
        download_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            installer,
            download_dir: download_dir.into(),
            cancel,
        }
    }

    /// Install the packages named by `requirement`.
    ///
    /// `requirement` is a single requirement or the path of a requirements
    /// file. Parse and download errors are returned as-is; install failures
    /// are collected and returned together as
    /// [`ManagerError::InstallsFailed`](crate::manager::ManagerError::InstallsFailed).
    pub fn run(&self, requirement: &str) -> ManagerResult<RunSummary> {
        let mut state = RunState::Init;

        let parsed = parse_requirements(requirement)?;
        advance(&mut state, RunState::Parsed);
        info!(
            requirements = parsed.requirements.len(),
            with_extras = parsed.extras.len(),
            "Parsed requirements"
        );

        let result = self.stage_and_install(&parsed, &mut state);
        advance(&mut state, RunState::Cleaned);

        if let Err(e) = &result {
            debug!(error = %e, "Run failed");
        }
        result
    }

    /// Download into a scoped staging directory and install from it.
    ///
    /// The staging guard is dropped when this returns, whatever the outcome.
    fn stage_and_install(
        &self,
        parsed: &ParsedRequirements,
        state: &mut RunState,
    ) -> ManagerResult<RunSummary> {
        let staged = PackageDownloader::new(&self.store).download(
            &parsed.requirements,
            &self.download_dir,
            &self.cancel,
        )?;
        advance(state, RunState::Downloaded);
        info!(
            archives = staged.archives().len(),
            bytes = staged.bytes_downloaded(),
            "Download done"
        );

        let report = self
            .installer
            .install_all(staged.path(), &parsed.extras, &self.cancel)?;
        advance(state, RunState::Installed);

        let fallbacks = report.fallback_count();
        let installed = report.into_result()?;

        Ok(RunSummary {
            requirements: parsed.requirements.len(),
            bytes_downloaded: staged.bytes_downloaded(),
            installed,
            fallbacks,
        })
    }

    /// Token that cancels this run.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

fn advance(state: &mut RunState, next: RunState) {
    debug!(from = %state, to = %next, "Run state");
    *state = next;
}
