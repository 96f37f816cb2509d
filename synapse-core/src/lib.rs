//! Core of the synapse service-discovery configurator.
//!
//! This crate owns the three tightly coupled subsystems that make up the
//! hard engineering of the system: the [`ReportMap`]/[`Watcher`] contract
//! that keeps a live replica of a service's backend servers, the
//! [`pipeline`] that debounces and batches report updates before handing
//! them to a typed [`Router`], and the typed routers themselves
//! ([`router::haproxy`], [`router::template`], [`router::console`]).
//!
//! Everything outside of this (CLI flags, the JSON config file loader,
//! the logging/metrics setup, the administrative HTTP API) lives in the
//! `synapse-cli` and `synapse-config` crates and only ever talks to this
//! crate through [`Service`], [`ServiceReport`] and [`Router`].

pub mod correlation;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod report_map;
pub mod router;
pub mod service;
pub mod watcher;

pub use correlation::{Correlation, CorrelationScope, CorrelationType};
pub use error::{CoreError, CoreResult};
pub use report::{Report, ServerSort};
pub use report_map::ReportMap;
pub use router::{Router, RouterKind};
pub use service::{Service, ServiceReport};
pub use watcher::Watcher;
