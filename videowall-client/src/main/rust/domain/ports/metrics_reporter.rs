use crate::domain::value_objects::{BulkOperationResult, ControllerState, ReconcileReport};

/// Port for metrics reporting
pub trait MetricsReporter: Send + Sync {
    fn report_transition(&self, from: ControllerState, to: ControllerState);
    fn report_start_failure(&self);
    fn report_stop_failure(&self);
    fn report_playback_fatal(&self);
    fn report_reconcile(&self, report: &ReconcileReport);
    fn report_bulk_operation(&self, operation: &str, result: &BulkOperationResult);
}
