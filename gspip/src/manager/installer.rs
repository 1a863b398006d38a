//! Installs staged archives with pip.
//!
//! This module handles:
//! - Building the `pip install` invocation for each staged archive
//! - Appending extras selectors to the install path
//! - Retrying once with a fallback interpreter
//! - Collecting a per-package outcome instead of stopping at the first failure

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::requirement::ExtrasMap;

use super::error::{ManagerError, ManagerResult};
use super::locator::archive_base_name;
use super::process::render_command;
use super::traits::CommandRunner;

/// A fully built `python -m pip install` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl InstallCommand {
    /// Build the install command for one archive.
    ///
    /// Without a target the package is installed into the interpreter's
    /// environment and dependencies are resolved. With a target the install
    /// is isolated and dependencies are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::path::Path;
    /// use gspip::manager::InstallCommand;
    ///
    /// let cmd = InstallCommand::new(Path::new("python3"), "pkgs/foo.tar.gz", None);
    /// assert_eq!(cmd.args(), ["-m", "pip", "install", "--quiet", "--upgrade", "pkgs/foo.tar.gz"]);
    ///
    /// let cmd = InstallCommand::new(
    ///     Path::new("python3"),
    ///     "pkgs/foo.tar.gz",
    ///     Some(Path::new("/opt/pkgs")),
    /// );
    /// assert_eq!(
    ///     cmd.args(),
    ///     ["-m", "pip", "install", "--quiet", "--no-deps", "--upgrade", "-t", "/opt/pkgs", "pkgs/foo.tar.gz"]
    /// );
    /// ```
    pub fn new(interpreter: &Path, install_path: &str, target_dir: Option<&Path>) -> Self {
        let mut args: Vec<String> = ["-m", "pip", "install", "--quiet"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        match target_dir {
            Some(target) => {
                args.push("--no-deps".to_string());
                args.push("--upgrade".to_string());
                args.push("-t".to_string());
                args.push(target.display().to_string());
            }
            None => args.push("--upgrade".to_string()),
        }
        args.push(install_path.to_string());

        Self {
            program: interpreter.to_path_buf(),
            args,
        }
    }

    /// The interpreter to run.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments after the interpreter.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The same invocation with another interpreter.
    pub fn with_program(&self, program: &Path) -> Self {
        Self {
            program: program.to_path_buf(),
            args: self.args.clone(),
        }
    }
}

impl fmt::Display for InstallCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_command(&self.program, &self.args))
    }
}

/// Install path for a staged archive: `{staging}/{file}` plus any extras.
pub fn install_path(staging_dir: &Path, file_name: &str, extras: Option<&str>) -> String {
    format!(
        "{}{}",
        staging_dir.join(file_name).display(),
        extras.unwrap_or("")
    )
}

/// Which interpreter completed an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAttempt {
    /// The configured interpreter succeeded.
    Primary,
    /// The primary failed and the fallback interpreter succeeded.
    Fallback,
}

/// Result of installing one staged archive.
#[derive(Debug)]
pub struct InstallOutcome {
    /// Staged archive filename.
    pub archive: String,
    /// The primary invocation.
    pub command: InstallCommand,
    /// How the install ended.
    pub result: ManagerResult<InstallAttempt>,
}

impl InstallOutcome {
    /// Whether the package was installed.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes for every archive in the staging directory.
#[derive(Debug, Default)]
pub struct InstallReport {
    outcomes: Vec<InstallOutcome>,
}

impl InstallReport {
    /// All outcomes, in install order.
    pub fn outcomes(&self) -> &[InstallOutcome] {
        &self.outcomes
    }

    /// Number of archives attempted.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &InstallOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Archives that installed.
    pub fn installed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.archive.as_str())
    }

    /// Number of installs that needed the fallback interpreter.
    pub fn fallback_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, Ok(InstallAttempt::Fallback)))
            .count()
    }

    /// Collapse the report into one error if any package failed.
    pub fn into_result(self) -> ManagerResult<Vec<String>> {
        let attempted = self.outcomes.len();
        let mut installed = Vec::new();
        let mut failures = Vec::new();

        for outcome in self.outcomes {
            match outcome.result {
                Ok(_) => installed.push(outcome.archive),
                Err(e) => failures.push(e),
            }
        }

        if failures.is_empty() {
            Ok(installed)
        } else {
            Err(ManagerError::InstallsFailed {
                failures,
                attempted,
            })
        }
    }
}

/// Installs every archive found in a staging directory.
pub struct PackageInstaller<R: CommandRunner> {
    runner: R,
    interpreter: PathBuf,
    fallback_interpreter: Option<PathBuf>,
    target_dir: Option<PathBuf>,
}

impl<R: CommandRunner> PackageInstaller<R> {
    /// Create an installer that runs `interpreter` through `runner`.
    ///
    /// No fallback interpreter is set; configure one with
    /// [`with_fallback_interpreter`](Self::with_fallback_interpreter).
    pub fn new(runner: R, interpreter: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            interpreter: interpreter.into(),
            fallback_interpreter: None,
            target_dir: None,
        }
    }

    /// Set the interpreter for the retry. `None` makes every retry fail with
    /// [`ManagerError::MissingHomeDirectory`].
    pub fn with_fallback_interpreter(mut self, fallback: Option<PathBuf>) -> Self {
        self.fallback_interpreter = fallback;
        self
    }

    /// Install into `target` with `--no-deps` instead of the active
    /// environment.
    pub fn with_target_dir(mut self, target: Option<PathBuf>) -> Self {
        self.target_dir = target.filter(|t| !t.as_os_str().is_empty());
        self
    }

    /// The primary install command for a staged archive.
    pub fn command_for(
        &self,
        staging_dir: &Path,
        file_name: &str,
        extras: &ExtrasMap,
    ) -> InstallCommand {
        let base = archive_base_name(file_name);
        let path = install_path(staging_dir, file_name, extras.get(base));
        InstallCommand::new(&self.interpreter, &path, self.target_dir.as_deref())
    }

    /// Install every regular file in `staging_dir`.
    ///
    /// Each archive gets its own outcome; one failure does not stop the
    /// others. Cancellation stops the run and is returned as an error.
    pub fn install_all(
        &self,
        staging_dir: &Path,
        extras: &ExtrasMap,
        cancel: &CancellationToken,
    ) -> ManagerResult<InstallReport> {
        let mut report = InstallReport::default();

        for file_name in staged_files(staging_dir)? {
            if cancel.is_cancelled() {
                return Err(ManagerError::Cancelled);
            }

            let outcome = self.install_one(staging_dir, &file_name, extras, cancel);
            if matches!(outcome.result, Err(ManagerError::Cancelled)) {
                return Err(ManagerError::Cancelled);
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    fn install_one(
        &self,
        staging_dir: &Path,
        file_name: &str,
        extras: &ExtrasMap,
        cancel: &CancellationToken,
    ) -> InstallOutcome {
        let command = self.command_for(staging_dir, file_name, extras);
        info!(package = file_name, command = %command, "Installing package");

        let result = match self.runner.run(command.program(), command.args(), cancel) {
            Ok(()) => Ok(InstallAttempt::Primary),
            Err(ManagerError::Cancelled) => Err(ManagerError::Cancelled),
            Err(primary) => {
                error!(package = file_name, command = %command, error = %primary, "Install failed");
                self.retry_with_fallback(&command, file_name, primary, cancel)
            }
        };

        if let Err(e) = &result {
            if !e.is_cancelled() {
                error!(package = file_name, error = %e, "Giving up on package");
            }
        }

        InstallOutcome {
            archive: file_name.to_string(),
            command,
            result,
        }
    }

    fn retry_with_fallback(
        &self,
        command: &InstallCommand,
        file_name: &str,
        primary: ManagerError,
        cancel: &CancellationToken,
    ) -> ManagerResult<InstallAttempt> {
        let attempt = match &self.fallback_interpreter {
            Some(fallback) => {
                let retry = command.with_program(fallback);
                warn!(
                    package = file_name,
                    interpreter = %fallback.display(),
                    "Attempting install with fallback interpreter"
                );
                self.runner.run(retry.program(), retry.args(), cancel)
            }
            None => Err(ManagerError::MissingHomeDirectory),
        };

        match attempt {
            Ok(()) => {
                info!(package = file_name, "Installed with fallback interpreter");
                Ok(InstallAttempt::Fallback)
            }
            Err(ManagerError::Cancelled) => Err(ManagerError::Cancelled),
            Err(fallback) => Err(ManagerError::InstallFailed {
                package: file_name.to_string(),
                primary: Box::new(primary),
                fallback: Box::new(fallback),
            }),
        }
    }
}

/// Regular files in the staging directory, sorted by name.
fn staged_files(staging_dir: &Path) -> ManagerResult<Vec<String>> {
    let entries = fs::read_dir(staging_dir).map_err(|e| ManagerError::ReadFailed {
        path: staging_dir.to_path_buf(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ManagerError::ReadFailed {
            path: staging_dir.to_path_buf(),
            source: e,
        })?;
        if entry.path().is_file() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    files.sort();

    Ok(files)
}
