//! JSON configuration file loading for synapse, and the glue that turns
//! the parsed document into the typed objects `synapse-core` runs.
//!
//! Deliberately does not depend on `synapse-watcher`: a `Service`'s
//! `watcher_config` stays a raw [`serde_json::Value`] here, and is only
//! turned into a concrete watcher (today, `synapse_watcher::ZookeeperWatcher`)
//! by the binary crate that owns both dependencies.

mod build;
mod error;
mod model;
mod settings;

pub use build::{build_routers, RouterAssembly};
pub use error::{ConfigError, ConfigResult};
pub use model::{RouterConfig, ServiceConfig};
pub use settings::Settings;
