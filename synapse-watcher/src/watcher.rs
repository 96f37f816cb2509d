//! [`synapse_core::Watcher`] implementation backed by a registry path.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use synapse_core::error::CoreResult;
use synapse_core::report_map::ReportMap;
use synapse_core::Watcher;

use crate::config::ZookeeperWatcherConfig;
use crate::root;

/// Watches one registry path, keeping a [`ReportMap`] in sync with its
/// children for as long as this watcher stays alive.
pub struct ZookeeperWatcher {
    service_name: String,
    config: ZookeeperWatcherConfig,
    cancel: CancellationToken,
}

impl ZookeeperWatcher {
    /// Construct a watcher for `service_name`, not yet connected.
    pub fn new(service_name: String, config: ZookeeperWatcherConfig) -> Self {
        ZookeeperWatcher {
            service_name,
            config,
            cancel: CancellationToken::new(),
        }
    }
}

#[async_trait]
impl Watcher for ZookeeperWatcher {
    fn name(&self) -> &str {
        &self.service_name
    }

    /// Spawns the background watch task and returns immediately with an
    /// empty [`ReportMap`]; it fills in once the registry connection is
    /// established, which the pipeline tolerates since a service with
    /// no reports yet is treated as not-yet-reporting rather than down.
    async fn watch(&self) -> CoreResult<ReportMap> {
        let (map, _change_rx) = ReportMap::new();

        tokio::spawn(root::run(
            self.config.connect_string(),
            self.config.session_timeout(),
            self.config.path.clone(),
            self.service_name.clone(),
            map.clone(),
            self.cancel.clone(),
        ));

        Ok(map)
    }
}

impl Drop for ZookeeperWatcher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn watch_returns_immediately_with_an_empty_map() {
        let config: ZookeeperWatcherConfig =
            serde_json::from_str(r#"{"hosts": ["127.0.0.1:2181"], "path": "/services/web"}"#)
                .unwrap();
        let watcher = ZookeeperWatcher::new("web".into(), config);
        let map = watcher.watch().await.unwrap();
        assert!(map.is_empty());
        assert_eq!(watcher.name(), "web");
    }
}
