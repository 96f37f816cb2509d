//! Contract between a registry backend and the report pipeline.

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::report_map::ReportMap;

/// Something that watches a registry path for its set of backend
/// servers and keeps a [`ReportMap`] up to date.
///
/// A watcher owns exactly one background task that survives for the
/// lifetime of the returned [`ReportMap`]; callers only ever read the
/// map and listen for its change ticks; they never mutate it directly.
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Name used in logs and metrics labels; typically the watched path.
    fn name(&self) -> &str;

    /// Begin watching. Establishes the initial connection, populates
    /// the returned map with whatever is present at call time, and
    /// spawns the task that keeps it current until the watcher itself
    /// is dropped.
    async fn watch(&self) -> CoreResult<ReportMap>;
}
