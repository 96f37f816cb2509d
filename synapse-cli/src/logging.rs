//! Tracing setup: a single fmt layer filtered by `RUST_LOG`, falling
//! back to the `--log-level` flag when the environment variable is
//! unset.

use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialise the global tracing subscriber. Safe to call at most once
/// per process; called from `main` before anything else logs.
pub fn init(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .try_init()?;

    Ok(())
}
