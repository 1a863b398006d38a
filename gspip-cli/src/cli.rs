//! Command line interface definition.

use std::path::PathBuf;

use clap::Parser;

/// Pip install Python packages stored in a Google Cloud Storage bucket.
///
/// Archives are expected at `{name}/{name}-{version}.tar.gz` in the bucket.
#[derive(Debug, Parser)]
#[command(name = "gs-pip-install")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Pip install packages stored in a Google Cloud Storage bucket")]
pub struct Cli {
    /// Bucket to fetch from (`name`, `gs://name`, or `file:///dir`)
    #[arg(short = 'b', long, visible_alias = "bucket_name", value_name = "BUCKET")]
    pub bucket_name: Option<String>,

    /// Project billed for requester-pays buckets
    #[arg(short = 'p', long, value_name = "PROJECT")]
    pub project: Option<String>,

    /// Package spec (`name`, `name==version`, `name[extra]`) or requirements file
    #[arg(short = 'r', long, value_name = "SPEC_OR_FILE")]
    pub requirement: String,

    /// Staging directory for downloaded archives; must not exist
    #[arg(short = 'd', long, visible_alias = "download_dir", value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Install into this directory instead of the active environment
    #[arg(short = 't', long, default_value = "", value_name = "DIR")]
    pub target: String,

    /// Interpreter used for the first install attempt
    #[arg(long, value_name = "PATH")]
    pub python: Option<PathBuf>,

    /// Interpreter used when the first attempt fails
    #[arg(long, value_name = "PATH")]
    pub fallback_python: Option<PathBuf>,

    /// Seconds before an install is killed (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Settings file (default: ~/.gs-pip-install/config.ini)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
