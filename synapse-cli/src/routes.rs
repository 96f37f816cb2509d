//! The administrative HTTP API: `/healthz` for liveness and `/metrics`
//! for the Prometheus exposition text. Deliberately thin -- the core
//! only ever calls counter/gauge setters; rendering them is all this
//! surface does.

use std::future::ready;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

/// Build the admin router. Takes the already-installed Prometheus
/// handle so `/metrics` can render it on demand without holding any
/// lock of its own.
pub fn router(recorder_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(move || ready(recorder_handle.render())))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}

async fn healthz() -> &'static str {
    "ok"
}
