//! Error taxonomy for the core crate.
//!
//! Config errors are fatal at startup (the caller should exit); the rest
//! are recovered locally by the component that owns the resource, per
//! the error handling design.

use thiserror::Error;

/// Result alias used throughout `synapse-core`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by the core pipeline and typed routers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A service or router configuration was invalid at init time. Fatal.
    #[error("invalid configuration for {component}: {reason}")]
    Config {
        /// The component whose configuration failed validation.
        component: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Rendering a router's template failed. No file is written.
    #[error("failed to render template: {0}")]
    Template(String),

    /// Writing the rendered configuration to disk failed.
    #[error("failed to write configuration file {path}: {source}")]
    Io {
        /// Path that failed to write.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The reload command failed or timed out.
    #[error("reload command failed: {0}")]
    Reload(String),

    /// The management socket dialogue failed.
    #[error("haproxy socket update failed: {0}")]
    Socket(String),

    /// A post-template command failed.
    #[error("post-template command failed: {0}")]
    PostCommand(String),
}
