//! Decides between a cheap stats-socket update and a full
//! render-and-reload, and builds the per-service frontend/backend
//! blocks that feed [`super::haproxy_client::HaProxyClient`].

use std::collections::HashMap;

use async_trait::async_trait;
use handlebars::Handlebars;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::report::Report;
use crate::service::ServiceReport;

use super::haproxy_client::HaProxyClient;
use super::Router;

/// `routerOptions` for a service routed through haproxy: free-form
/// lines appended to the service's `frontend` and `backend` blocks.
#[derive(Debug, Default, Deserialize)]
struct HaproxyRouterOptions {
    #[serde(default)]
    frontend: Vec<String>,
    #[serde(default)]
    backend: Vec<String>,
}

/// `serverOptions` for a service routed through haproxy: a handlebars
/// template rendered once per report and appended to its `server`
/// line. The only variable exposed is `name`.
#[derive(Debug, Default, Deserialize)]
struct HaproxyServerOptions {
    #[serde(default)]
    template: Option<String>,
}

pub struct HaproxyRouter {
    client: HaProxyClient,
    /// Last dispatched reports per service (`event_key` -> reports),
    /// used purely to decide `isSocketUpdatable`; independent from the
    /// pipeline's own `lastEvents`.
    previous: Mutex<HashMap<String, Vec<Report>>>,
    renderer: Handlebars<'static>,
}

impl HaproxyRouter {
    pub fn new(client: HaProxyClient) -> HaproxyRouter {
        HaproxyRouter {
            client,
            previous: Mutex::new(HashMap::new()),
            renderer: Handlebars::new(),
        }
    }

    fn render_server_options(&self, template: &str, report: &Report) -> CoreResult<String> {
        self.renderer
            .render_template(template, &serde_json::json!({ "name": report.name }))
            .map_err(|e| CoreError::Template(e.to_string()))
    }

    fn build_server_line(&self, report: &Report, server_options: &Value) -> CoreResult<String> {
        let mut line = format!("server {} {}:{}", report.name, report.host, report.port);
        if let Some(weight) = report.weight {
            line.push_str(&format!(" weight {weight}"));
        }
        line.push_str(if report.is_available() { " enabled" } else { " disabled" });
        if let Some(opts) = &report.haproxy_server_options {
            line.push(' ');
            line.push_str(opts);
        }

        let options: HaproxyServerOptions = if server_options.is_null() {
            HaproxyServerOptions::default()
        } else {
            serde_json::from_value(server_options.clone()).map_err(|e| CoreError::Config {
                component: "haproxy server_options".into(),
                reason: e.to_string(),
            })?
        };
        if let Some(template) = &options.template {
            let rendered = self.render_server_options(template, report)?;
            if !rendered.is_empty() {
                line.push(' ');
                line.push_str(&rendered);
            }
        }

        Ok(line)
    }

    /// TRUE iff every server in `reports` existed in the previous
    /// dispatch for this service (`key`) with an identical
    /// `haproxy_server_options` string. A service with no previous
    /// dispatch is never socket-updatable: its backend does not exist
    /// in the running configuration yet.
    fn is_socket_updatable(&self, key: &str, reports: &[Report]) -> bool {
        let previous = self.previous.lock();
        let Some(prev_reports) = previous.get(key) else {
            return false;
        };
        reports.iter().all(|r| {
            prev_reports
                .iter()
                .any(|p| p.name == r.name && p.haproxy_server_options == r.haproxy_server_options)
        })
    }
}

#[async_trait]
impl Router for HaproxyRouter {
    async fn update(&self, batch: &[ServiceReport]) -> CoreResult<()> {
        let mut reload_required = !self.client.has_socket();

        for service_report in batch {
            let service = &service_report.service;
            let key = service.event_key();
            let backend_name = service.backend_name();

            let router_options: HaproxyRouterOptions = if service.router_options.is_null() {
                HaproxyRouterOptions::default()
            } else {
                serde_json::from_value(service.router_options.clone()).map_err(|e| CoreError::Config {
                    component: format!("haproxy router_options for {}", service.name),
                    reason: e.to_string(),
                })?
            };

            let mut frontend_lines = router_options.frontend;
            frontend_lines.push(format!("default_backend {backend_name}"));

            let mut backend_lines = router_options.backend;
            for report in &service_report.reports {
                backend_lines.push(self.build_server_line(report, &service.server_options)?);
            }

            if !reload_required && !self.is_socket_updatable(&key, &service_report.reports) {
                reload_required = true;
            }

            self.client
                .upsert_service_sections(backend_name, frontend_lines, backend_lines);
            self.previous.lock().insert(key, service_report.reports.clone());
        }

        if reload_required {
            self.client.reload().await
        } else if let Err(err) = self.client.socket_update().await {
            tracing::warn!(error = %err, "socket update failed, falling back to reload");
            crate::metrics::incr_router_update_failure("haproxy_socket");
            self.client.reload().await
        } else {
            Ok(())
        }
    }

    fn kind_label(&self) -> &'static str {
        "haproxy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ServerSort;
    use crate::router::haproxy_client::{HaProxyClientConfig, HaProxyConfig};
    use crate::service::Service;
    use std::sync::Arc;

    fn report(name: &str, opts: Option<&str>) -> Report {
        Report {
            name: name.into(),
            host: "10.0.0.1".into(),
            port: 8080,
            available: None,
            weight: None,
            haproxy_server_options: opts.map(|s| s.to_string()),
            labels: Default::default(),
            unavailable_reason: None,
            creation_time: 0,
        }
    }

    fn make_router() -> HaproxyRouter {
        let client = HaProxyClient::new(HaProxyClientConfig::default(), HaProxyConfig::default());
        HaproxyRouter::new(client)
    }

    #[test]
    fn no_previous_dispatch_is_never_socket_updatable() {
        let router = make_router();
        assert!(!router.is_socket_updatable("web_1", &[report("a", None)]));
    }

    #[test]
    fn identical_options_are_socket_updatable() {
        let router = make_router();
        router
            .previous
            .lock()
            .insert("web_1".into(), vec![report("a", Some("check"))]);
        assert!(router.is_socket_updatable("web_1", &[report("a", Some("check"))]));
    }

    #[test]
    fn differing_options_require_reload() {
        let router = make_router();
        router
            .previous
            .lock()
            .insert("web_1".into(), vec![report("a", Some("check"))]);
        assert!(!router.is_socket_updatable("web_1", &[report("a", Some("check backup"))]));
    }

    #[test]
    fn builds_server_line_with_weight_and_state() {
        let router = make_router();
        let mut r = report("a", None);
        r.weight = Some(10);
        r.available = Some(false);
        let line = router.build_server_line(&r, &Value::Null).unwrap();
        assert_eq!(line, "server a 10.0.0.1:8080 weight 10 disabled");
    }

    #[tokio::test]
    async fn update_builds_frontend_default_backend_line() {
        let router = make_router();
        let service = Arc::new(Service::new(
            Some("web".into()),
            "/web",
            Value::Null,
            Value::Null,
            Value::Null,
            ServerSort::Name,
            None,
        ));
        let batch = vec![ServiceReport {
            service: service.clone(),
            reports: vec![report("a", None)],
        }];
        // reload_command is empty, so this will error -- we only assert
        // the sections were recorded before the reload attempt.
        let _ = router.update(&batch).await;
        assert!(router.previous.lock().contains_key(&service.event_key()));
    }
}
