//! gs-pip-install - Pip install packages stored in a Google Cloud Storage bucket
//!
//! ```text
//! gs-pip-install -b my-bucket -r requirements_gcs.txt -t /opt/pkgs
//! ```

mod cli;
mod error;
mod install;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use gspip::logging::{self, LoggingConfig};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::Cli;
use crate::error::CliError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let logging_config = LoggingConfig::from_verbosity(cli.verbose, cli.quiet)
        .with_log_file(cli.log_file.clone())
        .with_ansi(std::io::stderr().is_terminal());
    let _logging = logging::init(&logging_config)?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Received interrupt, stopping");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let summary = install::run(cli, cancel)?;

    if !cli.quiet {
        for archive in &summary.installed {
            println!("Installed {}", archive);
        }
        if summary.fallbacks > 0 {
            println!(
                "{} package(s) needed the fallback interpreter",
                summary.fallbacks
            );
        }
    }
    Ok(())
}
