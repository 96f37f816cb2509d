//! Typed routers: the things a batch of [`ServiceReport`]s is
//! ultimately dispatched to.

pub mod console;
pub mod haproxy;
pub mod haproxy_client;
pub mod template;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::service::ServiceReport;

/// A sink for batches of [`ServiceReport`]s, invoked once per debounce
/// window by the pipeline.
#[async_trait]
pub trait Router: Send + Sync {
    /// Apply a batch of service reports. Implementations decide their
    /// own cheapest valid action; errors are counted by the caller
    /// under [`Router::kind_label`] and do not stop the pipeline.
    async fn update(&self, batch: &[ServiceReport]) -> CoreResult<()>;

    /// Label used in the `router_update_failure{type}` metric.
    fn kind_label(&self) -> &'static str;
}

/// Which typed router a configuration entry resolves to. Kept as an
/// enum (rather than trait objects everywhere) so `synapse-config` can
/// match on it while still handing callers a `dyn Router`.
pub enum RouterKind {
    Console(console::ConsoleRouter),
    Haproxy(haproxy::HaproxyRouter),
    Template(template::TemplateRouter),
}

#[async_trait]
impl Router for RouterKind {
    async fn update(&self, batch: &[ServiceReport]) -> CoreResult<()> {
        match self {
            RouterKind::Console(r) => r.update(batch).await,
            RouterKind::Haproxy(r) => r.update(batch).await,
            RouterKind::Template(r) => r.update(batch).await,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            RouterKind::Console(r) => r.kind_label(),
            RouterKind::Haproxy(r) => r.kind_label(),
            RouterKind::Template(r) => r.kind_label(),
        }
    }
}
