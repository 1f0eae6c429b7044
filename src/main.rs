// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use kube::{
    runtime::{
        controller::Config as ControllerConfig, watcher, watcher::Config as WatcherConfig,
        Controller, PredicateConfig, WatchStreamExt,
    },
    Api, Client,
};
use std::sync::Arc;
use subnetbind::{
    backend::{BackendClient, HttpBackendClient},
    config::OperatorConfig,
    constants::TOKIO_WORKER_THREADS,
    context::Context,
    crd::{Subnet, SubnetConnectionBindingMap, SubnetSet},
    metrics::serve_metrics,
    reconcilers::{collect, error_policy, reconcile_binding, watches},
    scheduler::ScheduledTask,
    service::BindingService,
    store::BindingStore,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = OperatorConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("subnetbind-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or `text`).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: OperatorConfig) -> Result<()> {
    init_tracing();
    config.validate()?;

    info!(
        cluster = %config.cluster_name,
        backend = %config.backend_url,
        "Starting SubnetConnectionBindingMap controller"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;

    let backend: Arc<dyn BackendClient> = Arc::new(HttpBackendClient::new(
        &config.backend_url,
        config.backend_auth(),
        config.backend_timeout(),
    )?);
    let service = Arc::new(BindingService::new(
        Arc::new(BindingStore::new()),
        backend,
        config.cluster_name.clone(),
        config.max_children_per_call,
    ));

    // Conflict checks read the store, so it must mirror the backend before
    // the first reconciliation.
    let loaded = service.initialize().await?;
    info!(bindings = loaded, "Local binding store initialized from backend");

    let shutdown = CancellationToken::new();
    let ctx = Arc::new(Context::for_cluster(
        client.clone(),
        service,
        shutdown.clone(),
    ));

    let gc_ctx = ctx.clone();
    let gc = ScheduledTask::start(
        "garbage-collector",
        config.gc_interval(),
        &shutdown,
        move || {
            let ctx = gc_ctx.clone();
            async move {
                if let Err(e) = collect(&ctx).await {
                    warn!(error = %e, "Garbage collection pass failed");
                }
            }
        },
    );

    let metrics_addr = config.metrics_addr();
    let metrics_token = shutdown.clone();
    let metrics_server = tokio::spawn(async move {
        if let Err(e) = serve_metrics(&metrics_addr, metrics_token).await {
            error!("Metrics server failed: {e:#}");
        }
    });

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("Shutdown signal received, draining controller");
        signal_token.cancel();
    });

    run_binding_controller(client, ctx, config.concurrency, shutdown.clone()).await;

    if !shutdown.is_cancelled() {
        error!("CRITICAL: SubnetConnectionBindingMap controller exited unexpectedly");
        shutdown.cancel();
        gc.stop().await;
        anyhow::bail!("SubnetConnectionBindingMap controller exited unexpectedly");
    }

    gc.stop().await;
    if let Err(e) = metrics_server.await {
        warn!("Metrics server task ended abnormally: {e}");
    }
    info!("Shutdown complete");
    Ok(())
}

/// Run the `SubnetConnectionBindingMap` controller until `shutdown` is cancelled.
///
/// Besides the binding requests themselves, the controller watches `Subnet`
/// and `SubnetSet` readiness so requests blocked on a dependency are retried
/// as soon as it is realized.
async fn run_binding_controller(
    client: Client,
    ctx: Arc<Context>,
    concurrency: u16,
    shutdown: CancellationToken,
) {
    info!("Starting SubnetConnectionBindingMap controller");

    let api = Api::<SubnetConnectionBindingMap>::all(client.clone());
    let subnets = Api::<Subnet>::all(client.clone());
    let subnet_sets = Api::<SubnetSet>::all(client);

    let controller = Controller::new(api, WatcherConfig::default())
        .with_config(ControllerConfig::default().concurrency(concurrency));
    let requests = controller.store();
    let requests_for_sets = requests.clone();

    let subnet_events = watcher(subnets, WatcherConfig::default())
        .default_backoff()
        .touched_objects()
        .predicate_filter(watches::subnet_readiness, PredicateConfig::default());
    let subnet_set_events = watcher(subnet_sets, WatcherConfig::default())
        .default_backoff()
        .touched_objects()
        .predicate_filter(watches::subnet_set_readiness, PredicateConfig::default());

    controller
        .watches_stream(subnet_events, move |subnet| {
            watches::requests_for_subnet(&requests.state(), &subnet)
        })
        .watches_stream(subnet_set_events, move |set| {
            watches::requests_for_subnet_set(&requests_for_sets.state(), &set)
        })
        .graceful_shutdown_on(shutdown.cancelled_owned())
        .run(reconcile_binding, error_policy, ctx)
        .for_each(|result| async move {
            if let Err(e) = result {
                debug!("Controller event not reconciled: {e}");
            }
        })
        .await;
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
