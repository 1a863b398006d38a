//! gspip - Install Python packages stored in a Google Cloud Storage bucket
//!
//! This library fetches source archives laid out as
//! `{name}/{name}-{version}.tar.gz` in a bucket, stages them locally, and
//! installs them with `pip`.
//!
//! - [`requirement`] parses a single requirement or a requirements file
//! - [`manager`] downloads, installs, and cleans up
//! - [`config`] reads defaults from `~/.gs-pip-install/config.ini`
//! - [`logging`] sets up the tracing subscriber

pub mod config;
pub mod logging;
pub mod manager;
pub mod requirement;

/// Version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
