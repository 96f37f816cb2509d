//! Process wiring for the `synapse` binary.
//!
//! Everything that is genuinely part of the core -- the pipeline, the
//! typed routers, the watcher contract -- lives in `synapse-core` and
//! `synapse-watcher`. This crate only assembles them: load the config
//! file, build the typed routers and their services, spin up one
//! watcher task and one pipeline task per router, serve the
//! administrative HTTP API, and tear everything down in order when
//! asked to stop.

pub mod cli;
pub mod logging;
pub mod metrics;
pub mod paths;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use synapse_core::pipeline::{Pipeline, DEFAULT_EVENTS_BUFFER_DURATION};
use synapse_core::{Router, Service, ServiceReport, Watcher};
use synapse_config::{build_routers, RouterAssembly, Settings};
use synapse_watcher::{ZookeeperWatcher, ZookeeperWatcherConfig};

/// Capacity of the mpsc channel feeding one router's [`Pipeline`].
/// Sized generously so a burst of simultaneous service events never
/// makes a watcher's forwarding task block; the debounce stage drains
/// it promptly regardless.
const EVENTS_CHANNEL_CAPACITY: usize = 128;

/// Load configuration, assemble every router, and run until cancelled
/// by a signal. Propagation on shutdown is top-down: the admin server
/// stops accepting new requests, the cancellation token is flipped,
/// every watcher's forwarding task returns (dropping its router's
/// sender and, by extension, its underlying `Watcher` and that
/// watcher's own child tasks), and finally each router's pipeline
/// drains its last batch and exits.
pub async fn run(args: cli::Cli) -> Result<()> {
    let settings = Settings::load(&args.config)
        .with_context(|| format!("loading configuration from {}", args.config.display()))?;

    logging::init(args.log_level.as_deref().unwrap_or(&settings.log_level))?;

    tracing::info!(
        config = %args.config.display(),
        routers = settings.routers.len(),
        "starting synapse",
    );

    let recorder_handle = metrics::setup_metrics_recorder()?;
    let assemblies = build_routers(settings.routers).context("building configured routers")?;

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    for assembly in assemblies {
        spawn_router(assembly, &cancel, &mut tasks);
    }

    let admin_addr: SocketAddr = format!("{}:{}", settings.api_host, settings.api_port)
        .parse()
        .with_context(|| format!("invalid admin listen address {}:{}", settings.api_host, settings.api_port))?;
    tasks.push(tokio::spawn(serve_admin_api(admin_addr, recorder_handle, cancel.clone())));
    tokio::spawn(handle_signals(cancel.clone()));

    for task in tasks {
        if let Err(err) = task.await {
            tracing::error!(error = %err, "a synapse task panicked");
        }
    }

    Ok(())
}

/// Spawn one router's pipeline task plus one forwarding task per
/// service, wiring them through a shared mpsc channel. `tasks` is
/// extended in place so the caller can await every handle at shutdown.
fn spawn_router(
    assembly: RouterAssembly,
    cancel: &CancellationToken,
    tasks: &mut Vec<tokio::task::JoinHandle<()>>,
) {
    let RouterAssembly { router, services, debounce } = assembly;
    let router: Arc<dyn Router> = Arc::new(router);
    let debounce = if debounce.is_zero() { DEFAULT_EVENTS_BUFFER_DURATION } else { debounce };

    let (tx, rx) = mpsc::channel(EVENTS_CHANNEL_CAPACITY);
    let pipeline = Pipeline::new(router, debounce);
    tasks.push(tokio::spawn(pipeline.run(rx)));

    for service in services {
        let service_cancel = cancel.child_token();
        let service_tx = tx.clone();
        tasks.push(tokio::spawn(async move {
            let service_name = service.name.clone();
            if let Err(err) = run_service_watcher(service, service_tx, service_cancel).await {
                tracing::error!(service = %service_name, error = %err, "service watcher failed");
            }
        }));
    }
    // Dropping the router's own sender leaves one live sender per
    // service task; once every one of those tasks returns, the
    // channel closes and the pipeline's run loop drains its last
    // batch and exits.
    drop(tx);
}

/// Run one service's watcher for as long as `cancel` stays live,
/// forwarding every [`synapse_core::ReportMap`] change as a
/// [`ServiceReport`]. A malformed `watcher` configuration is fatal for
/// this service only, matching the core's error handling design.
async fn run_service_watcher(
    service: Arc<Service>,
    tx: mpsc::Sender<ServiceReport>,
    cancel: CancellationToken,
) -> Result<()> {
    let watcher_config: ZookeeperWatcherConfig = serde_json::from_value(service.watcher_config.clone())
        .with_context(|| format!("invalid watcher configuration for service {}", service.name))?;
    let watcher = ZookeeperWatcher::new(service.name.clone(), watcher_config);

    let map = watcher.watch().await.context("starting watcher")?;
    let mut changed = map.subscribe();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed_result = changed.changed() => {
                if changed_result.is_err() {
                    // The map's writer is gone; nothing left to watch.
                    break;
                }
                let reports = map.snapshot();
                if tx.send(ServiceReport { service: service.clone(), reports }).await.is_err() {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Serve `/healthz` and `/metrics` until `cancel` fires.
async fn serve_admin_api(
    addr: SocketAddr,
    recorder_handle: metrics_exporter_prometheus::PrometheusHandle,
    cancel: CancellationToken,
) {
    tracing::info!(%addr, "admin API listening");

    let app = routes::router(recorder_handle);
    let server = axum::Server::bind(&addr).serve(app.into_make_service());

    if let Err(err) = server.with_graceful_shutdown(cancel.cancelled()).await {
        tracing::error!(error = %err, "admin API server exited with an error");
    }
}

/// Wait for SIGINT or SIGTERM (Unix) and cancel the token, initiating
/// shutdown.
async fn handle_signals(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received");
    cancel.cancel();
}
