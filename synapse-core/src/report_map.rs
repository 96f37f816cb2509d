//! Thread-safe name to [`Report`](crate::Report) map with a change signal.
//!
//! Owned by exactly one `Watcher`, which is the sole writer; readers take
//! a shared lock. Every state-changing mutation emits a change signal on
//! a `watch` channel: rapid-fire mutations coalesce into a single
//! pending change rather than queuing, so a burst of registry events
//! never makes the writer wait on a slow consumer, and the consumer
//! always sees the latest snapshot whenever it next checks in.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::report::Report;

/// A mapping keyed by registry node path to [`Report`], plus a change
/// signal consumed by the watcher's translation task.
#[derive(Clone)]
pub struct ReportMap {
    inner: Arc<RwLock<HashMap<String, Report>>>,
    changed: watch::Sender<()>,
}

impl ReportMap {
    /// Construct an empty map and its change receiver.
    pub fn new() -> (Self, watch::Receiver<()>) {
        let (tx, rx) = watch::channel(());
        (
            ReportMap {
                inner: Arc::new(RwLock::new(HashMap::new())),
                changed: tx,
            },
            rx,
        )
    }

    /// Obtain another receiver for this map's change signal. Every
    /// receiver sees its own independent "has this changed since I last
    /// looked" state, so multiple tasks can each track the map
    /// independently.
    pub fn subscribe(&self) -> watch::Receiver<()> {
        self.changed.subscribe()
    }

    /// Insert or replace the report at `path`, emitting a change signal.
    pub fn insert(&self, path: impl Into<String>, report: Report) {
        self.inner.write().insert(path.into(), report);
        self.notify();
    }

    /// Remove the report at `path` if present, emitting a change signal.
    pub fn remove(&self, path: &str) {
        self.inner.write().remove(path);
        self.notify();
    }

    /// Reset the map to empty, emitting a change signal. Called when the
    /// root or a child node is explicitly deleted -- never on session
    /// loss, where stale reports are preferred over an empty view.
    pub fn clear(&self) {
        self.inner.write().clear();
        self.notify();
    }

    /// Current snapshot of all reports, in unspecified order.
    pub fn snapshot(&self) -> Vec<Report> {
        self.inner.read().values().cloned().collect()
    }

    /// Number of reports currently tracked.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the map is currently empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    fn notify(&self) {
        // No receivers is a normal state (e.g. between a watcher's
        // `watch()` returning and its caller subscribing); nothing to
        // notify in that case.
        let _ = self.changed.send(());
    }
}

impl Default for ReportMap {
    fn default() -> Self {
        Self::new().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str) -> Report {
        Report {
            name: name.into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available: None,
            weight: None,
            haproxy_server_options: None,
            labels: Default::default(),
            unavailable_reason: None,
            creation_time: 0,
        }
    }

    #[tokio::test]
    async fn insert_emits_a_change_and_updates_snapshot() {
        let (map, mut rx) = ReportMap::new();
        map.insert("/svc/a", report("a"));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert_eq!(map.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn remove_and_clear_update_snapshot() {
        let (map, mut rx) = ReportMap::new();
        map.insert("/svc/a", report("a"));
        map.insert("/svc/b", report("b"));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        map.remove("/svc/a");
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert_eq!(map.snapshot().len(), 1);

        map.clear();
        assert!(rx.has_changed().unwrap());
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn independent_subscribers_each_see_the_change() {
        let (map, _rx) = ReportMap::new();
        let mut a = map.subscribe();
        let mut b = map.subscribe();

        map.insert("/svc/a", report("a"));

        assert!(a.has_changed().unwrap());
        assert!(b.has_changed().unwrap());
    }
}
