//! Prometheus metrics recorder: install it once at startup and hand
//! the render handle to the admin API.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle whose
/// `render()` produces the exposition-format text for `/metrics`.
pub fn setup_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}
