//! Root watcher: the outer loop that owns the registry session, lists
//! the watched path's children, and keeps one [`node`] task running per
//! child that is currently listed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use zookeeper_async::{KeeperState, WatchedEvent, WatchedEventType, ZkError, ZooKeeper};

use synapse_core::ReportMap;

use crate::node;
use crate::session::ChannelWatcher;

/// Back-off between a failed connect/list attempt and the next retry.
const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Run until `cancel` fires. Reconnects on session loss without
/// clearing `map` -- stale reports are preferred over an empty view,
/// since an empty view propagates downstream as "no active servers"
/// (see the pipeline's empty-set suppression). The map is cleared only
/// on an explicit `NodeDeleted` for the root path or one of its
/// children.
pub async fn run(
    connect_string: String,
    session_timeout: Duration,
    root_path: String,
    service_name: String,
    map: ReportMap,
    cancel: CancellationToken,
) {
    'session: loop {
        if cancel.is_cancelled() {
            return;
        }

        let (session_watcher, mut session_events) = ChannelWatcher::new();
        let zk = match ZooKeeper::connect(&connect_string, session_timeout, session_watcher).await {
            Ok(zk) => Arc::new(zk),
            Err(err) => {
                tracing::warn!(
                    service = %service_name,
                    error = %err,
                    "failed to connect to registry, retrying in 1s",
                );
                synapse_core::metrics::incr_watcher_failure(&service_name, "watch");
                if !sleep_or_cancel(RETRY_BACKOFF, &cancel).await {
                    return;
                }
                continue 'session;
            }
        };

        let mut children: HashMap<String, CancellationToken> = HashMap::new();

        loop {
            let (watcher, mut watch_events) = ChannelWatcher::new();
            match zk.get_children_w(&root_path, watcher).await {
                Ok(names) => {
                    if names.is_empty() {
                        map.clear();
                    }
                    reconcile_children(&zk, &root_path, &service_name, &map, &mut children, names, &cancel);
                }
                Err(ZkError::NoNode) => {
                    map.clear();
                    cancel_children(&mut children);
                    tracing::warn!(
                        service = %service_name,
                        path = %root_path,
                        "watched root path does not exist, retrying in 1s",
                    );
                    if !sleep_or_cancel(RETRY_BACKOFF, &cancel).await {
                        return;
                    }
                    continue;
                }
                Err(err) => {
                    tracing::warn!(
                        service = %service_name,
                        path = %root_path,
                        error = %err,
                        "failed to list registry children, retrying in 1s",
                    );
                    synapse_core::metrics::incr_watcher_failure(&service_name, "watch");
                    if !sleep_or_cancel(RETRY_BACKOFF, &cancel).await {
                        cancel_children(&mut children);
                        return;
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    cancel_children(&mut children);
                    return;
                }
                event = watch_events.recv() => {
                    match event {
                        Some(WatchedEvent { event_type: WatchedEventType::NodeDeleted, .. }) => {
                            map.clear();
                            cancel_children(&mut children);
                        }
                        Some(_) => {}
                        None => {}
                    }
                }
                session_event = session_events.recv() => {
                    if let Some(event) = session_event {
                        if is_session_lost(&event) {
                            tracing::warn!(
                                service = %service_name,
                                "registry session lost, reconnecting; stale reports kept until reconnect",
                            );
                            cancel_children(&mut children);
                            continue 'session;
                        }
                    }
                }
            }
        }
    }
}

/// Spawn a [`node`] task for every newly-listed child, and cancel +
/// purge the ones no longer listed, so the map stays an exact mirror
/// of the currently observed children.
fn reconcile_children(
    zk: &Arc<ZooKeeper>,
    root_path: &str,
    service_name: &str,
    map: &ReportMap,
    children: &mut HashMap<String, CancellationToken>,
    names: Vec<String>,
    parent_cancel: &CancellationToken,
) {
    let current: HashSet<&str> = names.iter().map(String::as_str).collect();

    children.retain(|name, token| {
        if current.contains(name.as_str()) {
            true
        } else {
            token.cancel();
            map.remove(&child_path(root_path, name));
            false
        }
    });

    for name in names {
        if children.contains_key(&name) {
            continue;
        }
        let full_path = child_path(root_path, &name);
        let child_cancel = parent_cancel.child_token();
        tokio::spawn(node::run(
            zk.clone(),
            full_path,
            name.clone(),
            service_name.to_string(),
            map.clone(),
            child_cancel.clone(),
        ));
        children.insert(name, child_cancel);
    }
}

fn child_path(root: &str, name: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), name)
}

fn cancel_children(children: &mut HashMap<String, CancellationToken>) {
    for (_, token) in children.drain() {
        token.cancel();
    }
}

fn is_session_lost(event: &WatchedEvent) -> bool {
    matches!(
        event.keeper_state,
        KeeperState::Disconnected | KeeperState::Expired | KeeperState::AuthFailed
    )
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_path_strips_trailing_slash() {
        assert_eq!(child_path("/services/web/", "a"), "/services/web/a");
        assert_eq!(child_path("/services/web", "a"), "/services/web/a");
    }
}
