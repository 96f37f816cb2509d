//! Top-level configuration file, loaded through the `config` crate's
//! builder with a single `File` source, since the wire format is a
//! flat JSON document with no environment layering.

use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::model::RouterConfig;

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    3455
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The whole of `synapse.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_api_host")]
    pub api_host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub routers: Vec<RouterConfig>,
}

impl Settings {
    /// Load and deserialize `path`. Any failure here is fatal at
    /// startup: the config crate reports both file-not-found and
    /// schema mismatches through the same `config::ConfigError`.
    pub fn load(path: &Path) -> ConfigResult<Settings> {
        let to_load_error = |source: config::ConfigError| ConfigError::Load {
            path: path.display().to_string(),
            source,
        };

        let built = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(to_load_error)?;

        built.try_deserialize().map_err(to_load_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_console_config() {
        let path = std::env::temp_dir().join(format!("synapse-config-test-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"routers": [{"type": "console", "services": []}]}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.api_port, 3455);
        assert_eq!(settings.routers.len(), 1);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Settings::load(Path::new("/nonexistent/synapse.json")).is_err());
    }
}
