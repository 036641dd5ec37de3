use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::domain::ports::MetricsReporter;
use crate::domain::value_objects::{BulkOperationResult, ControllerState, ReconcileReport};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref LIVE_TILES: IntGauge = IntGauge::new(
        "videowall_live_tiles",
        "Number of tiles holding a live backend session"
    ).expect("metric can be created");

    // Labelled by target state
    pub static ref TILE_TRANSITIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("videowall_tile_transitions_total", "Tile state machine transitions"),
        &["to"]
    ).expect("metric can be created");

    pub static ref START_FAILURES: IntCounter = IntCounter::new(
        "videowall_stream_start_failures_total",
        "Stream start requests rejected or failed"
    ).expect("metric can be created");

    pub static ref STOP_FAILURES: IntCounter = IntCounter::new(
        "videowall_stream_stop_failures_total",
        "Stream stop requests rejected or failed"
    ).expect("metric can be created");

    pub static ref PLAYBACK_FATAL: IntCounter = IntCounter::new(
        "videowall_playback_fatal_total",
        "Terminal playback failures, unsupported environments included"
    ).expect("metric can be created");

    pub static ref RECONCILE_ADOPTED: IntCounter = IntCounter::new(
        "videowall_reconcile_adopted_total",
        "Registry sessions adopted by idle tiles"
    ).expect("metric can be created");

    pub static ref RECONCILE_RELEASED: IntCounter = IntCounter::new(
        "videowall_reconcile_released_total",
        "Live tiles released because their session left the registry"
    ).expect("metric can be created");

    pub static ref RECONCILE_UNAVAILABLE: IntCounter = IntCounter::new(
        "videowall_reconcile_registry_unavailable_total",
        "Reconciliation passes skipped because the registry could not be fetched"
    ).expect("metric can be created");

    // Labelled by operation (start/stop) and item outcome (succeeded/failed)
    pub static ref BULK_ITEMS: IntCounterVec = IntCounterVec::new(
        Opts::new("videowall_bulk_items_total", "Items processed by bulk start/stop"),
        &["operation", "outcome"]
    ).expect("metric can be created");
}

pub struct PrometheusReporter;

impl PrometheusReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn init_metrics() -> Result<(), prometheus::Error> {
        REGISTRY.register(Box::new(LIVE_TILES.clone()))?;
        REGISTRY.register(Box::new(TILE_TRANSITIONS.clone()))?;
        REGISTRY.register(Box::new(START_FAILURES.clone()))?;
        REGISTRY.register(Box::new(STOP_FAILURES.clone()))?;
        REGISTRY.register(Box::new(PLAYBACK_FATAL.clone()))?;
        REGISTRY.register(Box::new(RECONCILE_ADOPTED.clone()))?;
        REGISTRY.register(Box::new(RECONCILE_RELEASED.clone()))?;
        REGISTRY.register(Box::new(RECONCILE_UNAVAILABLE.clone()))?;
        REGISTRY.register(Box::new(BULK_ITEMS.clone()))?;
        Ok(())
    }

    pub fn gather_metrics() -> Vec<u8> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return b"# Error encoding metrics\n".to_vec();
        }
        buffer
    }
}

impl Default for PrometheusReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsReporter for PrometheusReporter {
    fn report_transition(&self, from: ControllerState, to: ControllerState) {
        let label = to.to_string();
        TILE_TRANSITIONS.with_label_values(&[label.as_str()]).inc();
        if to == ControllerState::Live && from != ControllerState::Live {
            LIVE_TILES.inc();
        } else if from == ControllerState::Live && to != ControllerState::Live {
            LIVE_TILES.dec();
        }
    }

    fn report_start_failure(&self) {
        START_FAILURES.inc();
    }

    fn report_stop_failure(&self) {
        STOP_FAILURES.inc();
    }

    fn report_playback_fatal(&self) {
        PLAYBACK_FATAL.inc();
    }

    fn report_reconcile(&self, report: &ReconcileReport) {
        if report.registry_unavailable {
            RECONCILE_UNAVAILABLE.inc();
            return;
        }
        RECONCILE_ADOPTED.inc_by(report.adopted as u64);
        RECONCILE_RELEASED.inc_by(report.released as u64);
    }

    fn report_bulk_operation(&self, operation: &str, result: &BulkOperationResult) {
        BULK_ITEMS
            .with_label_values(&[operation, "succeeded"])
            .inc_by(result.succeeded as u64);
        BULK_ITEMS
            .with_label_values(&[operation, "failed"])
            .inc_by(result.failed.len() as u64);
    }
}
