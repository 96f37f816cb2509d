//! Thin wrappers around the five `synapse_*` gauges/counters this crate
//! emits. The core never configures a recorder or exporter -- it only
//! ever calls these setters; installing `metrics-exporter-prometheus`
//! and serving `/metrics` is `synapse-cli`'s job.

/// Set the current available-server gauge for `service`.
pub fn set_service_available_count(service: &str, count: u64) {
    metrics::gauge!("synapse_service_available_count", count as f64, "service" => service.to_string());
}

/// Set the current unavailable-server gauge for `service`.
pub fn set_service_unavailable_count(service: &str, count: u64) {
    metrics::gauge!("synapse_service_unavailable_count", count as f64, "service" => service.to_string());
}

/// Increment a router update failure. `kind` is the router type
/// (`haproxy`, `template`, `console`); pass `"<type>_socket"` for a
/// socket-update failure that fell through to a reload.
pub fn incr_router_update_failure(kind: &str) {
    metrics::counter!("synapse_router_update_failure", 1, "type" => kind.to_string());
}

/// Increment a watcher failure. `kind` is `"watch"` for a transient
/// registry RPC failure or `"content"` for a payload decode failure.
pub fn incr_watcher_failure(service: &str, kind: &str) {
    metrics::counter!(
        "synapse_watcher_failure",
        1,
        "service" => service.to_string(),
        "type" => kind.to_string(),
    );
}
