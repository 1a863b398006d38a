//! The install command: resolve settings, then fetch and install.

use gspip::config::ConfigFile;
use gspip::manager::{BucketSpec, ManagerConfig, Orchestrator, RunSummary};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::error::CliError;

/// Settings for one run after merging flags over the settings file.
#[derive(Debug)]
pub struct ResolvedRun {
    pub bucket: BucketSpec,
    pub config: ManagerConfig,
}

/// Merge command-line flags over the settings file. Flags win.
pub fn resolve(cli: &Cli, file: &ConfigFile) -> Result<ResolvedRun, CliError> {
    let bucket = cli
        .bucket_name
        .as_deref()
        .or(file.storage.bucket.as_deref())
        .ok_or_else(|| {
            CliError::Config(
                "no bucket given. Use --bucket-name or set bucket in [storage] of config.ini"
                    .to_string(),
            )
        })?;
    let bucket = BucketSpec::parse(bucket)?;

    let mut config = ManagerConfig::from_config_file(file).with_target_dir(cli.target.clone());

    if let Some(dir) = &cli.download_dir {
        config = config.with_download_dir(dir);
    }
    if let Some(python) = &cli.python {
        config = config.with_interpreter(python);
    }
    if let Some(fallback) = &cli.fallback_python {
        config = config.with_fallback_interpreter(fallback);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_install_timeout_secs(secs);
    }
    if let Some(project) = &cli.project {
        config = config.with_project(project);
    }

    Ok(ResolvedRun { bucket, config })
}

/// Load the settings file named by `--config`, or the default one.
///
/// An explicit file must load. A broken default file is reported and
/// replaced by defaults.
pub fn load_settings(cli: &Cli) -> Result<ConfigFile, CliError> {
    match &cli.config {
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load().unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring settings file");
            ConfigFile::default()
        })),
    }
}

/// Run the install command.
pub fn run(cli: &Cli, cancel: CancellationToken) -> Result<RunSummary, CliError> {
    let file = load_settings(cli)?;
    let resolved = resolve(cli, &file)?;
    debug!(bucket = %resolved.bucket, config = ?resolved.config, "Resolved settings");

    let orchestrator = Orchestrator::from_config(&resolved.bucket, &resolved.config, cancel)?;
    let summary = orchestrator.run(&cli.requirement)?;

    info!(
        installed = summary.installed.len(),
        fallbacks = summary.fallbacks,
        bytes = summary.bytes_downloaded,
        "Install finished"
    );
    Ok(summary)
}
