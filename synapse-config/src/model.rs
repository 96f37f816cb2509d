//! Raw (but typed) shape of the JSON configuration file.
//!
//! Fields router-type-specific options depend on (`routerOptions`,
//! `serverOptions`, `watcher`) stay as [`serde_json::Value`] here;
//! they're only interpreted once the owning typed router/watcher is
//! constructed, mirroring the original `RouterFromJson`/`WatcherFromJson`
//! peek-the-`type`-then-reparse pattern.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use synapse_core::{Correlation, ServerSort};

fn default_events_buffer_duration_in_milli() -> u64 {
    500
}

/// One entry of the configuration file's `routers` array.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RouterConfig {
    #[serde(rename_all = "camelCase")]
    Console {
        #[serde(default = "default_events_buffer_duration_in_milli")]
        events_buffer_duration_in_milli: u64,
        services: Vec<ServiceConfig>,
    },
    #[serde(rename_all = "camelCase")]
    Haproxy {
        #[serde(default = "default_events_buffer_duration_in_milli")]
        events_buffer_duration_in_milli: u64,
        services: Vec<ServiceConfig>,
        config_path: PathBuf,
        reload_command: Vec<String>,
        reload_min_interval_in_milli: Option<u64>,
        reload_timeout_in_milli: Option<u64>,
        #[serde(default)]
        cleanup_command: Option<Vec<String>>,
        cleanup_timeout_in_milli: Option<u64>,
        #[serde(default)]
        global: Vec<String>,
        #[serde(default)]
        defaults: Vec<String>,
        #[serde(default)]
        listen: BTreeMap<String, Vec<String>>,
        #[serde(default)]
        frontend: BTreeMap<String, Vec<String>>,
        #[serde(default)]
        backend: BTreeMap<String, Vec<String>>,
    },
    #[serde(rename_all = "camelCase")]
    Template {
        #[serde(default = "default_events_buffer_duration_in_milli")]
        events_buffer_duration_in_milli: u64,
        services: Vec<ServiceConfig>,
        #[serde(default)]
        template: Option<String>,
        #[serde(default)]
        template_file: Option<PathBuf>,
        destination_file: PathBuf,
        #[serde(default)]
        destination_file_mode: Option<u32>,
        #[serde(default)]
        post_command: Option<Vec<String>>,
        post_command_timeout_in_milli: Option<u64>,
    },
}

/// One entry of a router's `services` array. `watcher`/`routerOptions`/
/// `serverOptions` are carried raw; [`synapse_core::Service`] itself
/// never interprets them.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub watcher: Value,
    #[serde(default)]
    pub router_options: Value,
    #[serde(default)]
    pub server_options: Value,
    #[serde(default)]
    pub server_sort: ServerSort,
    #[serde(default)]
    pub server_correlation: Option<Correlation>,
}
