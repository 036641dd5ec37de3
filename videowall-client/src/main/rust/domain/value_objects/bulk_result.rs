use serde::Serialize;

use super::DeviceId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub device_id: DeviceId,
    pub reason: String,
}

/// Aggregated outcome of a bulk start or stop; partial failure is not an error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOperationResult {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: Vec<BulkFailure>,
}

impl BulkOperationResult {
    pub fn record_success(&mut self) {
        self.requested += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, device_id: DeviceId, reason: impl Into<String>) {
        self.requested += 1;
        self.failed.push(BulkFailure {
            device_id,
            reason: reason.into(),
        });
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}
