//! Default filesystem locations, kept to the one thing this binary
//! actually needs: where to look for the configuration file when
//! `--config` is not given.

use std::path::PathBuf;

/// Default configuration file path: `./synapse.json` in the current
/// working directory, matching the original `main.go`'s default
/// (`./synapse.json.conf`) adjusted for our JSON-only configuration
/// format.
pub fn default_config_file() -> PathBuf {
    PathBuf::from("./synapse.json")
}
