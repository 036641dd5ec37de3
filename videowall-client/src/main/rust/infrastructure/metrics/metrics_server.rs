use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use super::PrometheusReporter;
use crate::application::services::WallSummary;

const SERVICE_NAME: &str = "videowall-client";
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(serde::Serialize)]
struct ProbeBody {
    status: &'static str,
    service: &'static str,
    version: &'static str,
}

impl ProbeBody {
    fn new(status: &'static str) -> Self {
        Self {
            status,
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

fn routes<S>(
    ready: Arc<AtomicBool>,
    summary: S,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone
where
    S: Fn() -> WallSummary + Clone + Send + Sync + 'static,
{
    let metrics = warp::path("metrics").and(warp::get()).map(|| {
        warp::reply::with_header(
            PrometheusReporter::gather_metrics(),
            "content-type",
            PROMETHEUS_CONTENT_TYPE,
        )
    });

    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::json(&ProbeBody::new("healthy")));

    let livez = warp::path("livez").map(|| warp::reply::with_status("OK", StatusCode::OK));

    let readyz = warp::path("readyz").map(move || {
        let (body, code) = if ready.load(Ordering::SeqCst) {
            (ProbeBody::new("ready"), StatusCode::OK)
        } else {
            (ProbeBody::new("starting"), StatusCode::SERVICE_UNAVAILABLE)
        };
        warp::reply::with_status(warp::reply::json(&body), code)
    });

    // Header counters, same numbers the dashboard shows above the grid
    let wall = warp::path("wall")
        .and(warp::get())
        .map(move || warp::reply::json(&summary()));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    metrics
        .or(health)
        .or(livez)
        .or(readyz)
        .or(wall)
        .with(cors)
}

/// Bind the probe and metrics endpoints on `port` and serve them until `shutdown` resolves.
///
/// `/readyz` answers 503 until `ready` is set, which the daemon does once the wall is mounted.
pub fn serve_metrics<S>(
    port: u16,
    ready: Arc<AtomicBool>,
    summary: S,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> (SocketAddr, impl Future<Output = ()>)
where
    S: Fn() -> WallSummary + Clone + Send + Sync + 'static,
{
    tracing::info!("Metrics server starting on port {}", port);
    warp::serve(routes(ready, summary)).bind_with_graceful_shutdown(([0, 0, 0, 0], port), shutdown)
}
