//! Turns the raw [`RouterConfig`]/[`ServiceConfig`] tree into the typed
//! `synapse-core` objects that actually run: one [`RouterKind`] plus
//! its [`Service`]s and debounce window per router entry.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use synapse_core::router::console::ConsoleRouter;
use synapse_core::router::haproxy::HaproxyRouter;
use synapse_core::router::haproxy_client::{HaProxyClient, HaProxyClientConfig, HaProxyConfig};
use synapse_core::router::template::{TemplateRouter, TemplateRouterConfig};
use synapse_core::{Router, RouterKind, Service};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{RouterConfig, ServiceConfig};

/// One router entry, fully assembled and ready to drive a [`synapse_core::pipeline::Pipeline`].
pub struct RouterAssembly {
    pub router: RouterKind,
    pub services: Vec<Arc<Service>>,
    pub debounce: Duration,
}

/// Assemble every router entry in `routers`. Stops at the first error,
/// since a malformed router configuration is a fatal startup condition.
pub fn build_routers(routers: Vec<RouterConfig>) -> ConfigResult<Vec<RouterAssembly>> {
    routers.into_iter().map(build_router).collect()
}

fn build_router(entry: RouterConfig) -> ConfigResult<RouterAssembly> {
    match entry {
        RouterConfig::Console {
            events_buffer_duration_in_milli,
            services,
        } => Ok(RouterAssembly {
            router: RouterKind::Console(ConsoleRouter::new()),
            services: build_services(services)?,
            debounce: Duration::from_millis(events_buffer_duration_in_milli),
        }),

        RouterConfig::Haproxy {
            events_buffer_duration_in_milli,
            services,
            config_path,
            reload_command,
            reload_min_interval_in_milli,
            reload_timeout_in_milli,
            cleanup_command,
            cleanup_timeout_in_milli,
            global,
            defaults,
            listen,
            frontend,
            backend,
        } => {
            let mut client_config = HaProxyClientConfig {
                config_path,
                reload_command,
                cleanup_command,
                ..HaProxyClientConfig::default()
            };
            if let Some(ms) = reload_min_interval_in_milli {
                client_config.reload_min_interval = Duration::from_millis(ms);
            }
            if let Some(ms) = reload_timeout_in_milli {
                client_config.reload_timeout = Duration::from_millis(ms);
            }
            if let Some(ms) = cleanup_timeout_in_milli {
                client_config.cleanup_timeout = Duration::from_millis(ms);
            }

            let initial = HaProxyConfig { global, defaults, listen, frontend, backend };
            let client = HaProxyClient::new(client_config, initial);

            Ok(RouterAssembly {
                router: RouterKind::Haproxy(HaproxyRouter::new(client)),
                services: build_services(services)?,
                debounce: Duration::from_millis(events_buffer_duration_in_milli),
            })
        }

        RouterConfig::Template {
            events_buffer_duration_in_milli,
            services,
            template,
            template_file,
            destination_file,
            destination_file_mode,
            post_command,
            post_command_timeout_in_milli,
        } => {
            let template_text = resolve_template(template, template_file)?;

            let mut config = TemplateRouterConfig {
                template: template_text,
                destination: destination_file,
                post_command,
                ..TemplateRouterConfig::default()
            };
            if let Some(mode) = destination_file_mode {
                config.file_mode = mode;
            }
            if let Some(ms) = post_command_timeout_in_milli {
                config.post_command_timeout = Duration::from_millis(ms);
            }

            Ok(RouterAssembly {
                router: RouterKind::Template(TemplateRouter::new(config)),
                services: build_services(services)?,
                debounce: Duration::from_millis(events_buffer_duration_in_milli),
            })
        }
    }
}

/// Exactly one of `template`/`templateFile` is required, mirroring the
/// original template router's own init-time validation.
fn resolve_template(template: Option<String>, template_file: Option<PathBuf>) -> ConfigResult<String> {
    match (template, template_file) {
        (Some(text), None) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(&path).map_err(|e| ConfigError::Invalid {
            component: "template router".into(),
            reason: format!("reading templateFile {}: {e}", path.display()),
        }),
        (Some(_), Some(_)) => Err(ConfigError::Invalid {
            component: "template router".into(),
            reason: "exactly one of template/templateFile is required, got both".into(),
        }),
        (None, None) => Err(ConfigError::Invalid {
            component: "template router".into(),
            reason: "exactly one of template/templateFile is required, got neither".into(),
        }),
    }
}

fn build_services(services: Vec<ServiceConfig>) -> ConfigResult<Vec<Arc<Service>>> {
    services.into_iter().map(build_service).collect()
}

fn build_service(raw: ServiceConfig) -> ConfigResult<Arc<Service>> {
    let watched_path = watcher_path(&raw.watcher);

    Ok(Arc::new(Service::new(
        raw.name,
        &watched_path,
        raw.watcher,
        raw.router_options,
        raw.server_options,
        raw.server_sort,
        raw.server_correlation,
    )))
}

/// Every watcher type implemented so far (zookeeper) carries its root
/// path under `path`; used purely to derive a default service name when
/// one isn't given explicitly.
fn watcher_path(watcher: &Value) -> String {
    watcher
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
