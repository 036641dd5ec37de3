use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use videowall_client::domain::ports::NoopObserver;
use videowall_client::{
    serve_metrics, Config, GridOrchestrator, HeadlessSurfaceProvider, HlsEngineFactory,
    HttpStreamBackend, PrometheusReporter,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration
    let config = Config::parse();
    config.validate()?;

    // Initialize logging
    let filter = if config.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // Initialize metrics
    PrometheusReporter::init_metrics()?;

    info!("Starting video wall client");
    info!("  Backend: {}", config.base_url);
    info!("  Grid: {}x{}", config.grid_arity, config.grid_arity);
    info!("  Bulk mode: {:?}", config.bulk_mode);
    info!("  Metrics port: {}", config.metrics_port);

    // Convert CLI config to domain configs
    let orchestrator_config = config
        .to_orchestrator_config()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    // Create infrastructure implementations (dependency injection)
    let backend = Arc::new(
        HttpStreamBackend::new(
            config.base_url()?,
            config.api_token.as_deref(),
            config.request_timeout(),
        )
        .map_err(|e| anyhow::anyhow!("{}", e))?,
    );
    let media_http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?;
    let engines = Arc::new(if config.no_adaptive {
        HlsEngineFactory::disabled(media_http)
    } else {
        HlsEngineFactory::new(media_http)
    });
    let surfaces = Arc::new(HeadlessSurfaceProvider::new(config.native_hls, false));
    let metrics_reporter = Arc::new(PrometheusReporter::new());

    let wall = Arc::new(GridOrchestrator::new(
        orchestrator_config,
        backend,
        engines,
        surfaces,
        Arc::new(NoopObserver),
        metrics_reporter,
    ));

    // Start metrics server
    let ready = Arc::new(AtomicBool::new(false));
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let status_wall = Arc::clone(&wall);
    let (addr, server) = serve_metrics(
        config.metrics_port,
        Arc::clone(&ready),
        move || status_wall.summary(),
        async {
            shutdown_rx.await.ok();
        },
    );
    info!("Metrics server listening on http://{}", addr);
    let metrics_server = tokio::spawn(server);

    match wall.mount().await {
        Ok(report) => info!(
            adopted = report.adopted,
            registry_size = report.registry_size,
            "Wall mounted"
        ),
        Err(e) => warn!("Device list unavailable, wall starts empty: {}", e),
    }
    ready.store(true, Ordering::SeqCst);

    if config.auto_start {
        let result = wall.start_all().await;
        for failure in &result.failed {
            error!(device_id = %failure.device_id, "Start failed: {}", failure.reason);
        }
    }

    // Periodic reconciliation until Ctrl+C
    let mut ticker = tokio::time::interval(config.reconcile_interval());
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                wall.reconcile().await;
                let summary = wall.summary();
                info!(
                    devices = summary.devices,
                    visible = summary.visible,
                    live = summary.live,
                    errored = summary.errored,
                    "Wall status"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for ctrl+c: {}", e);
                }
                info!("Received shutdown signal");
                break;
            }
        }
    }

    if config.stop_on_exit {
        let result = wall.stop_all().await;
        info!(
            stopped = result.succeeded,
            failed = result.failed.len(),
            "Stopped running streams"
        );
    }
    wall.unmount();

    // Signal shutdown to metrics server
    let _ = shutdown_tx.send(());
    metrics_server.await?;

    info!("Video wall shutdown complete");
    Ok(())
}
