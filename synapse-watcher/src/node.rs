//! Per-child "node watcher": keeps one registry node's [`Report`]
//! current in the owning [`ReportMap`] until the node is deleted, the
//! connection sours, or the watcher is cancelled.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use zookeeper_async::{WatchedEventType, ZkError, ZooKeeper};

use synapse_core::ReportMap;

use crate::session::ChannelWatcher;
use crate::wire::decode_report;

/// Run until the node is deleted, an unrecoverable error occurs, or
/// `cancel` fires. Spawned fresh by the root watcher for every child
/// not yet tracked; never restarted by itself -- if it terminates
/// because of an error, the root watcher's next children refresh
/// respawns it, since the child is presumably still listed.
pub async fn run(
    zk: Arc<ZooKeeper>,
    full_path: String,
    node_name: String,
    service_name: String,
    map: ReportMap,
    cancel: CancellationToken,
) {
    loop {
        let (watcher, mut events) = ChannelWatcher::new();

        let fetched = zk.get_data_w(&full_path, watcher).await;

        match fetched {
            Ok((data, stat)) => match decode_report(&node_name, &data, stat.ctime) {
                Ok(report) => map.insert(full_path.clone(), report),
                Err(err) => {
                    tracing::warn!(
                        service = %service_name,
                        path = %full_path,
                        error = %err,
                        "malformed registry payload, keeping previous entry",
                    );
                    synapse_core::metrics::incr_watcher_failure(&service_name, "content");
                    // Entry untouched; still re-armed the watch above, so
                    // fall through to waiting on it.
                }
            },
            Err(ZkError::NoNode) => {
                map.remove(&full_path);
                return;
            }
            Err(err) => {
                tracing::warn!(
                    service = %service_name,
                    path = %full_path,
                    error = %err,
                    "failed to fetch registry node, giving up this node watcher",
                );
                synapse_core::metrics::incr_watcher_failure(&service_name, "watch");
                map.remove(&full_path);
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            event = events.recv() => {
                match event {
                    Some(event) => match event.event_type {
                        WatchedEventType::NodeDataChanged | WatchedEventType::None => continue,
                        WatchedEventType::NodeDeleted => {
                            map.remove(&full_path);
                            return;
                        }
                        _ => {
                            map.remove(&full_path);
                            return;
                        }
                    },
                    None => return,
                }
            }
        }
    }
}
