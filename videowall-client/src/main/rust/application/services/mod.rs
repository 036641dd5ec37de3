mod grid_orchestrator;
mod playback_adapter;
mod reconciler;
mod session_controller;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use grid_orchestrator::{BulkMode, GridOrchestrator, OrchestratorConfig, WallSummary};
pub use playback_adapter::PlaybackAdapter;
pub use reconciler::ActiveSessionReconciler;
pub use session_controller::{SessionController, StartTicket, StopTicket, TileSnapshot};

/// Lock a std mutex, ignoring poisoning
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
