use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::session_controller::SessionController;
use crate::domain::entities::ActiveStream;
use crate::domain::ports::{MetricsReporter, StreamBackend};
use crate::domain::value_objects::{ControllerState, ReconcileReport};

/// Aligns tile state with the backend's active-stream registry.
/// Advisory: a failed registry fetch changes nothing.
pub struct ActiveSessionReconciler {
    backend: Arc<dyn StreamBackend>,
    metrics: Arc<dyn MetricsReporter>,
}

impl ActiveSessionReconciler {
    pub fn new(backend: Arc<dyn StreamBackend>, metrics: Arc<dyn MetricsReporter>) -> Self {
        Self { backend, metrics }
    }

    pub async fn reconcile(&self, controllers: &[Arc<SessionController>]) -> ReconcileReport {
        let fetched_at = Utc::now();
        let registry = match self.backend.active_streams().await {
            Ok(registry) => registry,
            Err(e) => {
                warn!("Active stream registry unavailable, skipping reconciliation: {}", e);
                let report = ReconcileReport::unavailable();
                self.metrics.report_reconcile(&report);
                return report;
            }
        };

        let registry_ids: HashSet<String> = registry.iter().map(|e| e.session_id.clone()).collect();
        let mut report = ReconcileReport {
            registry_size: registry.len(),
            ..ReconcileReport::default()
        };

        for controller in controllers {
            match controller.state() {
                ControllerState::Idle => {
                    if let Some(entry) = newest_match(&registry, controller) {
                        if let Some(session) = entry.to_session() {
                            if controller.adopt(session) {
                                report.adopted += 1;
                            }
                        }
                    }
                }
                ControllerState::Live => {
                    if controller.release_if_absent(&registry_ids, fetched_at) {
                        report.released += 1;
                    }
                }
                _ => {}
            }

            if controller.clear_stale_if_absent(&registry_ids) {
                report.cleared += 1;
            }
        }

        if report.changed_anything() {
            info!(
                adopted = report.adopted,
                released = report.released,
                cleared = report.cleared,
                registry_size = report.registry_size,
                "Reconciled tiles with active streams"
            );
        } else {
            debug!(registry_size = report.registry_size, "Reconciliation found nothing to change");
        }
        self.metrics.report_reconcile(&report);
        report
    }
}

/// Most recently started registry entry for the controller's stream
fn newest_match<'a>(registry: &'a [ActiveStream], controller: &SessionController) -> Option<&'a ActiveStream> {
    let request = controller.request();
    registry
        .iter()
        .filter(|entry| entry.matches(&request))
        .max_by_key(|entry| entry.started_at)
}
