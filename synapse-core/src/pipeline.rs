//! Fan-in, debounce, and batch-dispatch of [`ServiceReport`]s to one
//! typed [`Router`].
//!
//! One `Pipeline` is owned by exactly one router's event loop. Events
//! for any number of services funnel through the same `mpsc` channel;
//! the pipeline itself is what decides when and in what shape they
//! finally reach the router's `update`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::report::Report;
use crate::router::Router;
use crate::service::ServiceReport;

/// Default debounce window: `events_buffer_duration`.
pub const DEFAULT_EVENTS_BUFFER_DURATION: Duration = Duration::from_millis(500);

/// Debounces and batches [`ServiceReport`]s before dispatching them to
/// a [`Router`].
pub struct Pipeline {
    router: Arc<dyn Router>,
    debounce: Duration,
}

impl Pipeline {
    pub fn new(router: Arc<dyn Router>, debounce: Duration) -> Pipeline {
        Pipeline { router, debounce }
    }

    /// Run the pipeline until `events` closes. Consumes `self` rather
    /// than taking `&self` so it can be driven to completion in its
    /// own task without any outstanding aliasing.
    pub async fn run(self, mut events: mpsc::Receiver<ServiceReport>) {
        let mut pending: HashMap<String, ServiceReport> = HashMap::new();
        let mut last_events: HashMap<String, ServiceReport> = HashMap::new();
        let mut deadline: Option<Instant> = None;

        loop {
            let sleep = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                received = events.recv() => {
                    match received {
                        Some(report) => {
                            pending.insert(report.service.event_key(), report);
                            deadline = Some(Instant::now() + self.debounce);
                        }
                        None => break,
                    }
                }
                _ = sleep, if deadline.is_some() => {
                    deadline = None;
                    if pending.is_empty() {
                        continue;
                    }
                    let batch = std::mem::take(&mut pending);
                    self.process_batch(batch, &mut last_events).await;
                }
            }
        }

        // Drain whatever was buffered when the channel closed so a
        // graceful shutdown doesn't silently drop the final state.
        if !pending.is_empty() {
            self.process_batch(pending, &mut last_events).await;
        }
    }

    async fn process_batch(
        &self,
        batch: HashMap<String, ServiceReport>,
        last_events: &mut HashMap<String, ServiceReport>,
    ) {
        let mut valid: Vec<(String, ServiceReport)> = Vec::with_capacity(batch.len());

        for (key, mut service_report) in batch {
            service_report
                .service
                .server_sort
                .sort(&mut service_report.reports);

            let (available, unavailable) = service_report.available_unavailable();
            crate::metrics::set_service_available_count(&service_report.service.name, available as u64);
            crate::metrics::set_service_unavailable_count(&service_report.service.name, unavailable as u64);

            if !service_report.has_active_servers() {
                if !service_report.service.has_reported() {
                    tracing::warn!(
                        service = %service_report.service.name,
                        "dropping empty-set report for a service that has never reported",
                    );
                } else {
                    tracing::warn!(
                        service = %service_report.service.name,
                        "empty-set report, keeping prior dispatched report",
                    );
                }
                continue;
            }

            if let Some(correlation) = &service_report.service.server_correlation {
                let other_last = last_events
                    .values()
                    .find(|other| other.service.name == correlation.other_service_name)
                    .map(|other| other.reports.as_slice());
                service_report.reports = correlation.apply(service_report.reports, other_last);
            }

            if let Some(previous) = last_events.get(&key) {
                reattach_missing_as_unavailable(&mut service_report.reports, &previous.reports);
            }

            valid.push((key, service_report));
        }

        if valid.is_empty() {
            return;
        }

        let dispatched: Vec<ServiceReport> = valid.iter().map(|(_, sr)| sr.clone()).collect();
        if let Err(err) = self.router.update(&dispatched).await {
            tracing::error!(error = %err, router = self.router.kind_label(), "router update failed");
            crate::metrics::incr_router_update_failure(self.router.kind_label());
        }

        for (key, service_report) in valid {
            service_report.service.mark_reported();
            last_events.insert(key, service_report);
        }
    }
}

/// For every server present in `previous` but absent from `reports`,
/// append a synthesised copy with `available=false` so the proxy
/// marks it maintenance rather than forgetting it outright.
fn reattach_missing_as_unavailable(reports: &mut Vec<Report>, previous: &[Report]) {
    let current_names: HashSet<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    for prev_report in previous {
        if !current_names.contains(prev_report.name.as_str()) {
            reports.push(prev_report.as_unavailable());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::{Correlation, CorrelationScope, CorrelationType};
    use crate::error::CoreResult;
    use crate::report::ServerSort;
    use crate::service::Service;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;

    struct RecordingRouter {
        calls: StdMutex<Vec<Vec<ServiceReport>>>,
    }

    impl RecordingRouter {
        fn new() -> Arc<RecordingRouter> {
            Arc::new(RecordingRouter { calls: StdMutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl Router for RecordingRouter {
        async fn update(&self, batch: &[ServiceReport]) -> CoreResult<()> {
            self.calls.lock().unwrap().push(batch.to_vec());
            Ok(())
        }

        fn kind_label(&self) -> &'static str {
            "recording"
        }
    }

    fn report(name: &str, available: Option<bool>) -> Report {
        Report {
            name: name.into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available,
            weight: None,
            haproxy_server_options: None,
            labels: Default::default(),
            unavailable_reason: None,
            creation_time: 0,
        }
    }

    fn service(name: &str) -> Arc<Service> {
        Arc::new(Service::new(
            Some(name.into()),
            &format!("/{name}"),
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            None,
        ))
    }

    #[tokio::test]
    async fn debounced_events_dispatch_as_one_batch() {
        let router = RecordingRouter::new();
        let pipeline = Pipeline::new(router.clone(), Duration::from_millis(30));
        let (tx, rx) = mpsc::channel(10);

        let handle = tokio::spawn(pipeline.run(rx));

        let svc = service("web");
        tx.send(ServiceReport { service: svc.clone(), reports: vec![report("a", None)] })
            .await
            .unwrap();
        tx.send(ServiceReport { service: svc.clone(), reports: vec![report("a", None), report("b", None)] })
            .await
            .unwrap();
        drop(tx);

        handle.await.unwrap();

        let calls = router.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].reports.len(), 2);
    }

    #[tokio::test]
    async fn empty_set_with_no_prior_report_is_dropped() {
        let router = RecordingRouter::new();
        let pipeline = Pipeline::new(router.clone(), Duration::from_millis(20));
        let (tx, rx) = mpsc::channel(10);

        let handle = tokio::spawn(pipeline.run(rx));
        let svc = service("web");
        tx.send(ServiceReport { service: svc, reports: vec![] }).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert!(router.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_server_reattached_as_unavailable() {
        let router = RecordingRouter::new();
        let pipeline = Pipeline::new(router.clone(), Duration::from_millis(20));
        let (tx, rx) = mpsc::channel(10);
        let handle = tokio::spawn(pipeline.run(rx));

        let svc = service("web");
        tx.send(ServiceReport { service: svc.clone(), reports: vec![report("a", None), report("b", None)] })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        tx.send(ServiceReport { service: svc, reports: vec![report("a", None)] }).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        let calls = router.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let second = &calls[1][0];
        let b = second.reports.iter().find(|r| r.name == "b").unwrap();
        assert_eq!(b.available, Some(false));
    }

    #[tokio::test]
    async fn correlation_excludes_current_primary() {
        let router = RecordingRouter::new();
        let pipeline = Pipeline::new(router.clone(), Duration::from_millis(50));
        let (tx, rx) = mpsc::channel(10);
        let handle = tokio::spawn(pipeline.run(rx));

        let primary = service("primary");
        let backup_service = Service::new(
            Some("backup".into()),
            "/backup",
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            Some(Correlation {
                kind: CorrelationType::ExcludeServer,
                other_service_name: "primary".into(),
                scope: CorrelationScope::First,
            }),
        );
        let backup = Arc::new(backup_service);

        tx.send(ServiceReport { service: primary, reports: vec![report("p1", None)] })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        tx.send(ServiceReport {
            service: backup,
            reports: vec![report("p1", None), report("b1", None)],
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let calls = router.calls.lock().unwrap();
        let backup_call = calls.iter().find(|batch| batch[0].service.name == "backup").unwrap();
        let names: Vec<_> = backup_call[0].reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b1"]);
    }
}
