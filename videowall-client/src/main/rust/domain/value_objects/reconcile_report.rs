use serde::Serialize;

/// What one reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Idle controllers that took over a registry session
    pub adopted: usize,
    /// Live controllers whose session vanished from the registry
    pub released: usize,
    /// Stale-session flags cleared
    pub cleared: usize,
    pub registry_size: usize,
    pub registry_unavailable: bool,
}

impl ReconcileReport {
    pub fn unavailable() -> Self {
        Self {
            registry_unavailable: true,
            ..Self::default()
        }
    }

    pub fn changed_anything(&self) -> bool {
        self.adopted + self.released + self.cleared > 0
    }
}
