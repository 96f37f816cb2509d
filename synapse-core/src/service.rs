//! Static configuration plus dynamic state for one watched service.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;

use crate::correlation::Correlation;
use crate::report::{Report, ServerSort};

static NEXT_SERVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate the next process-wide unique service id. Strictly
/// increasing, never reused; participates in backend naming so a
/// reloaded service never collides with a stale socket entry.
fn next_id() -> u64 {
    NEXT_SERVICE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A logical set of backend servers identified by a watched path, plus
/// the router-specific options it was configured with.
#[derive(Debug)]
pub struct Service {
    /// Derived from the watched path when unset: path with separators
    /// replaced by `_`, leading separator stripped.
    pub name: String,
    /// Raw watcher configuration, parsed by the typed watcher at init.
    pub watcher_config: Value,
    /// Raw router options, parsed by the typed router at init.
    pub router_options: Value,
    /// Raw per-server options, parsed by the typed router at init.
    pub server_options: Value,
    /// How to order this service's reports before dispatch.
    pub server_sort: ServerSort,
    /// Optional correlation rule against another service.
    pub server_correlation: Option<Correlation>,
    /// Monotonically assigned integer, unique within the process.
    pub id: u64,
    reported: AtomicBool,
}

impl Service {
    /// Construct a new service, deriving its name from `watched_path`
    /// when `name` is unset and assigning the next process-wide id.
    pub fn new(
        name: Option<String>,
        watched_path: &str,
        watcher_config: Value,
        router_options: Value,
        server_options: Value,
        server_sort: ServerSort,
        server_correlation: Option<Correlation>,
    ) -> Service {
        Service {
            name: name.unwrap_or_else(|| derive_name(watched_path)),
            watcher_config,
            router_options,
            server_options,
            server_sort,
            server_correlation,
            id: next_id(),
            reported: AtomicBool::new(false),
        }
    }

    /// The `lastEvents` key for this service: distinguishes renames and
    /// re-initialisations from a service that merely kept its name.
    pub fn event_key(&self) -> String {
        format!("{}_{}", self.name, self.id)
    }

    /// The backend name used when rendering proxy configuration.
    pub fn backend_name(&self) -> String {
        self.event_key()
    }

    /// Whether this service has ever had a report dispatched to its
    /// router.
    pub fn has_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }

    /// Mark this service as having had a report dispatched.
    pub fn mark_reported(&self) {
        self.reported.store(true, Ordering::Release);
    }
}

/// Path with separators replaced by `_`, leading separator stripped.
fn derive_name(path: &str) -> String {
    path.trim_start_matches('/').replace('/', "_")
}

/// A snapshot pairing a [`Service`] with a list of [`Report`]s, as
/// dispatched to (or buffered for) a typed router.
#[derive(Clone, Debug)]
pub struct ServiceReport {
    /// The service this report set belongs to.
    pub service: Arc<Service>,
    /// The reports, already sorted per `service.server_sort` by the
    /// time this reaches the pipeline's batch processing stage.
    pub reports: Vec<Report>,
}

impl ServiceReport {
    /// True iff any report is available (absent `available` counts as
    /// available).
    pub fn has_active_servers(&self) -> bool {
        self.reports.iter().any(Report::is_available)
    }

    /// `(available, unavailable)` counts.
    pub fn available_unavailable(&self) -> (usize, usize) {
        let available = self.reports.iter().filter(|r| r.is_available()).count();
        (available, self.reports.len() - available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_name_from_path() {
        assert_eq!(derive_name("/services/web"), "services_web");
        assert_eq!(derive_name("web"), "web");
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let a = Service::new(
            None,
            "/a",
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            None,
        );
        let b = Service::new(
            None,
            "/b",
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            None,
        );
        assert!(b.id > a.id);
    }

    #[test]
    fn event_key_distinguishes_reinit() {
        let a = Service::new(
            Some("svc".into()),
            "/svc",
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            None,
        );
        let b = Service::new(
            Some("svc".into()),
            "/svc",
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            None,
        );
        assert_ne!(a.event_key(), b.event_key());
    }
}
