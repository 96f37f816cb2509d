//! Error taxonomy for configuration loading. Every error here is fatal
//! at startup per the core's own error handling design.

use thiserror::Error;

/// Result alias used throughout `synapse-config`.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or parsed.
    #[error("failed to load configuration from {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: config::ConfigError,
    },

    /// A router or service entry was structurally valid JSON but
    /// violated a constraint this crate enforces before handing it to
    /// `synapse-core` (e.g. a template router missing both `template`
    /// and `templateFile`).
    #[error("invalid configuration for {component}: {reason}")]
    Invalid { component: String, reason: String },

    /// A `synapse-core` type rejected the configuration once
    /// constructed (e.g. `Correlation` with an unsupported variant).
    #[error(transparent)]
    Core(#[from] synapse_core::error::CoreError),
}
