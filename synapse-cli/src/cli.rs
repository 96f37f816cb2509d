//! Command line entry point: flag parsing only. Everything the flags
//! feed into lives in [`crate::run`].

use std::path::PathBuf;

use clap::Parser;

use crate::paths::default_config_file;

/// synapse: a service-discovery-driven configurator for an external
/// reverse proxy.
#[derive(Debug, Parser)]
#[command(name = "synapse", version, about = "Service-discovery-driven reverse-proxy configurator")]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, short = 'c', default_value_os_t = default_config_file())]
    pub config: PathBuf,

    /// Override the configured log level (otherwise `RUST_LOG` or the
    /// config file's `logLevel` wins, in that order).
    #[arg(long)]
    pub log_level: Option<String>,
}
