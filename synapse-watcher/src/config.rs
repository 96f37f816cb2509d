//! Typed configuration for [`crate::watcher::ZookeeperWatcher`], parsed
//! from the raw `watcher` JSON blob a `Service` carries until its typed
//! watcher is chosen (see `synapse_core::service::Service::watcher_config`).

use std::time::Duration;

use serde::Deserialize;

fn default_timeout_in_milli() -> u64 {
    2000
}

/// `watcher` configuration for a zookeeper-backed service, e.g.:
///
/// ```json
/// { "hosts": ["zk1:2181", "zk2:2181"], "path": "/services/web", "timeoutInMilli": 2000 }
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperWatcherConfig {
    /// Registry endpoints, `host:port` each.
    pub hosts: Vec<String>,
    /// Root path to watch; its children are the service's servers.
    pub path: String,
    /// Session timeout. Defaults to 2000ms per the registry's own
    /// default client timeout.
    #[serde(default = "default_timeout_in_milli")]
    pub timeout_in_milli: u64,
}

impl ZookeeperWatcherConfig {
    /// Session timeout as a [`Duration`].
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_in_milli)
    }

    /// Comma-joined connect string, the format `zookeeper-async`'s
    /// `ZooKeeper::connect` expects.
    pub fn connect_string(&self) -> String {
        self.hosts.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_default_timeout() {
        let config: ZookeeperWatcherConfig = serde_json::from_str(
            r#"{"hosts": ["zk1:2181"], "path": "/services/web"}"#,
        )
        .unwrap();
        assert_eq!(config.timeout_in_milli, 2000);
        assert_eq!(config.connect_string(), "zk1:2181");
    }

    #[test]
    fn joins_multiple_hosts() {
        let config: ZookeeperWatcherConfig = serde_json::from_str(
            r#"{"hosts": ["zk1:2181", "zk2:2181"], "path": "/web", "timeoutInMilli": 5000}"#,
        )
        .unwrap();
        assert_eq!(config.connect_string(), "zk1:2181,zk2:2181");
        assert_eq!(config.session_timeout(), Duration::from_millis(5000));
    }
}
