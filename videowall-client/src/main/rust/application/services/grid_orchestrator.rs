use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::lock_unpoisoned;
use super::playback_adapter::PlaybackAdapter;
use super::reconciler::ActiveSessionReconciler;
use super::session_controller::SessionController;
use crate::domain::entities::Device;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    EngineFactory, MetricsReporter, StreamBackend, StreamObserver, SurfaceProvider,
};
use crate::domain::value_objects::{
    BulkOperationResult, ControllerState, DeviceId, GridArity, PlaybackOptions, ReconcileReport,
    StreamRequest,
};

/// How bulk start/stop reach the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BulkMode {
    /// One request per tile, issued concurrently
    #[default]
    Concurrent,
    /// A single bulk request whose per-item results are applied to each tile
    Batched,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub arity: GridArity,
    pub device_filter: Option<DeviceId>,
    pub bulk_mode: BulkMode,
    /// Stream parameters for every tile; the device id is replaced per tile
    pub request_template: StreamRequest,
    pub playback: PlaybackOptions,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            arity: GridArity::default(),
            device_filter: None,
            bulk_mode: BulkMode::default(),
            request_template: StreamRequest::new(DeviceId(0)),
            playback: PlaybackOptions::default(),
        }
    }
}

/// Header counters of the wall
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WallSummary {
    pub devices: usize,
    pub visible: usize,
    pub live: usize,
    pub errored: usize,
    pub grid_arity: u8,
}

struct GridState {
    devices: Vec<Device>,
    arity: GridArity,
    filter: Option<DeviceId>,
    controllers: BTreeMap<DeviceId, Arc<SessionController>>,
}

/// Maps the device list onto a bounded grid of tiles and fans bulk
/// operations out across them
pub struct GridOrchestrator {
    backend: Arc<dyn StreamBackend>,
    engines: Arc<dyn EngineFactory>,
    surfaces: Arc<dyn SurfaceProvider>,
    observer: Arc<dyn StreamObserver>,
    metrics: Arc<dyn MetricsReporter>,
    reconciler: ActiveSessionReconciler,
    bulk_mode: BulkMode,
    template: StreamRequest,
    playback: PlaybackOptions,
    state: Mutex<GridState>,
}

impl GridOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        backend: Arc<dyn StreamBackend>,
        engines: Arc<dyn EngineFactory>,
        surfaces: Arc<dyn SurfaceProvider>,
        observer: Arc<dyn StreamObserver>,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Self {
        Self {
            reconciler: ActiveSessionReconciler::new(Arc::clone(&backend), Arc::clone(&metrics)),
            backend,
            engines,
            surfaces,
            observer,
            metrics,
            bulk_mode: config.bulk_mode,
            template: config.request_template,
            playback: config.playback,
            state: Mutex::new(GridState {
                devices: Vec::new(),
                arity: config.arity,
                filter: config.device_filter,
                controllers: BTreeMap::new(),
            }),
        }
    }

    /// Replace the device list. Inactive devices are dropped and tiles of
    /// vanished devices are retired.
    pub fn set_devices(&self, devices: Vec<Device>) {
        let mut state = lock_unpoisoned(&self.state);
        state.devices = devices.into_iter().filter(Device::is_active).collect();

        let known: HashSet<DeviceId> = state.devices.iter().map(Device::id).collect();
        let vanished: Vec<DeviceId> = state
            .controllers
            .keys()
            .filter(|id| !known.contains(id))
            .copied()
            .collect();
        for id in vanished {
            if let Some(controller) = state.controllers.remove(&id) {
                info!(device_id = %id, "Device left the wall, retiring tile");
                controller.retire();
            }
        }

        info!(devices = state.devices.len(), "Device list updated");
        self.refresh_visible(&mut state);
    }

    /// Resize the grid to `side` x `side`. Live tiles falling out of view
    /// keep their backend session and lose only their playback binding.
    pub fn set_grid_arity(&self, side: u8) -> Result<()> {
        let arity = GridArity::new(side)?;
        let mut state = lock_unpoisoned(&self.state);
        state.arity = arity;
        info!(arity = side, "Grid resized");
        self.refresh_visible(&mut state);
        Ok(())
    }

    pub fn set_device_filter(&self, filter: Option<DeviceId>) {
        let mut state = lock_unpoisoned(&self.state);
        state.filter = filter;
        self.refresh_visible(&mut state);
    }

    pub fn visible_devices(&self) -> Vec<Device> {
        let state = lock_unpoisoned(&self.state);
        visible(&state).into_iter().cloned().collect()
    }

    pub fn controller(&self, device_id: DeviceId) -> Option<Arc<SessionController>> {
        lock_unpoisoned(&self.state).controllers.get(&device_id).cloned()
    }

    /// Every tile, visible or not, ordered by device id
    pub fn controllers(&self) -> Vec<Arc<SessionController>> {
        lock_unpoisoned(&self.state).controllers.values().cloned().collect()
    }

    fn visible_controllers(&self) -> Vec<Arc<SessionController>> {
        let state = lock_unpoisoned(&self.state);
        visible(&state)
            .into_iter()
            .filter_map(|device| state.controllers.get(&device.id()).cloned())
            .collect()
    }

    /// Load devices from the backend, then adopt sessions already running
    pub async fn mount(&self) -> Result<ReconcileReport> {
        let devices = self.backend.devices().await?;
        self.set_devices(devices);
        Ok(self.reconcile().await)
    }

    /// Retire every tile. Backend sessions are left to expire.
    pub fn unmount(&self) {
        let controllers = std::mem::take(&mut lock_unpoisoned(&self.state).controllers);
        for controller in controllers.values() {
            controller.retire();
        }
        info!(tiles = controllers.len(), "Wall unmounted");
    }

    pub async fn reconcile(&self) -> ReconcileReport {
        let report = self.reconciler.reconcile(&self.controllers()).await;
        let mut state = lock_unpoisoned(&self.state);
        self.refresh_visible(&mut state);
        report
    }

    /// Start every visible tile in `Idle` or `Error`. All starts settle
    /// before the result is returned; individual failures are enumerated.
    pub async fn start_all(&self) -> BulkOperationResult {
        let targets: Vec<Arc<SessionController>> = self
            .visible_controllers()
            .into_iter()
            .filter(|c| c.state().is_startable())
            .collect();

        let result = match self.bulk_mode {
            BulkMode::Concurrent => self.start_concurrently(&targets).await,
            BulkMode::Batched => self.start_batched(&targets).await,
        };

        info!(
            requested = result.requested,
            succeeded = result.succeeded,
            failed = result.failed.len(),
            "Bulk start finished"
        );
        self.metrics.report_bulk_operation("start", &result);
        if result.requested > 0 {
            self.reconcile().await;
        }
        result
    }

    /// Stop every tile in `Live` or `Requesting`, hidden ones included
    pub async fn stop_all(&self) -> BulkOperationResult {
        let targets: Vec<Arc<SessionController>> = self
            .controllers()
            .into_iter()
            .filter(|c| c.state().is_stoppable())
            .collect();

        if targets.is_empty() {
            debug!("Bulk stop with no active tiles");
            return BulkOperationResult::default();
        }

        let result = match self.bulk_mode {
            BulkMode::Concurrent => self.stop_concurrently(&targets).await,
            BulkMode::Batched => self.stop_batched(&targets).await,
        };

        info!(
            requested = result.requested,
            succeeded = result.succeeded,
            failed = result.failed.len(),
            "Bulk stop finished"
        );
        self.metrics.report_bulk_operation("stop", &result);
        if result.requested > 0 {
            self.reconcile().await;
        }
        result
    }

    pub fn summary(&self) -> WallSummary {
        let state = lock_unpoisoned(&self.state);
        let mut summary = WallSummary {
            devices: state.devices.len(),
            visible: visible(&state).len(),
            grid_arity: state.arity.side(),
            ..WallSummary::default()
        };
        for controller in state.controllers.values() {
            match controller.state() {
                ControllerState::Live => summary.live += 1,
                ControllerState::Error => summary.errored += 1,
                _ => {}
            }
        }
        summary
    }

    async fn start_concurrently(&self, targets: &[Arc<SessionController>]) -> BulkOperationResult {
        let outcomes = join_all(targets.iter().map(|controller| {
            let request = self.template.for_device(controller.device_id());
            async move { (controller.device_id(), controller.start(request).await) }
        }))
        .await;

        let mut result = BulkOperationResult::default();
        for (device_id, outcome) in outcomes {
            match outcome {
                Ok(()) => result.record_success(),
                Err(e) => result.record_failure(device_id, e.to_string()),
            }
        }
        result
    }

    async fn start_batched(&self, targets: &[Arc<SessionController>]) -> BulkOperationResult {
        let mut result = BulkOperationResult::default();

        let begun = join_all(targets.iter().map(|controller| {
            let request = self.template.for_device(controller.device_id());
            async move { (controller.device_id(), controller.begin_start(request).await) }
        }))
        .await;

        let mut tickets = Vec::new();
        for (device_id, begun) in begun {
            match begun {
                Ok(Some(ticket)) => tickets.push(ticket),
                Ok(None) => {}
                Err(e) => result.record_failure(device_id, e.to_string()),
            }
        }
        if tickets.is_empty() {
            return result;
        }

        let requests: Vec<StreamRequest> = tickets.iter().map(|t| *t.request()).collect();
        let mut items: HashMap<DeviceId, std::result::Result<_, String>> =
            match self.backend.bulk_start(&requests).await {
                Ok(items) => items.into_iter().map(|i| (i.device_id, i.outcome)).collect(),
                Err(e) => {
                    warn!("Bulk start request failed: {}", e);
                    requests
                        .iter()
                        .map(|r| (r.device_id(), Err(e.to_string())))
                        .collect()
                }
            };

        for ticket in tickets {
            let device_id = ticket.request().device_id();
            let outcome = items
                .remove(&device_id)
                .unwrap_or_else(|| Err("missing from bulk response".to_string()))
                .map_err(DomainError::Rejected);
            match ticket.complete(outcome) {
                Ok(()) => result.record_success(),
                Err(e) => result.record_failure(device_id, e.to_string()),
            }
        }
        result
    }

    async fn stop_concurrently(&self, targets: &[Arc<SessionController>]) -> BulkOperationResult {
        let outcomes = join_all(
            targets
                .iter()
                .map(|controller| async move { (controller.device_id(), controller.stop().await) }),
        )
        .await;

        let mut result = BulkOperationResult::default();
        for (device_id, outcome) in outcomes {
            match outcome {
                Ok(()) => result.record_success(),
                Err(e) => result.record_failure(device_id, e.to_string()),
            }
        }
        result
    }

    async fn stop_batched(&self, targets: &[Arc<SessionController>]) -> BulkOperationResult {
        let tickets: Vec<_> = join_all(targets.iter().map(|c| c.begin_stop()))
            .await
            .into_iter()
            .flatten()
            .collect();

        let mut result = BulkOperationResult::default();
        if tickets.is_empty() {
            return result;
        }

        let session_ids: Vec<String> = tickets.iter().map(|t| t.session_id().to_string()).collect();
        let mut items: HashMap<String, std::result::Result<(), String>> =
            match self.backend.bulk_stop(&session_ids).await {
                Ok(items) => items.into_iter().map(|i| (i.session_id, i.outcome)).collect(),
                Err(e) => {
                    warn!("Bulk stop request failed: {}", e);
                    session_ids
                        .iter()
                        .map(|id| (id.clone(), Err(e.to_string())))
                        .collect()
                }
            };

        for ticket in tickets {
            let device_id = ticket.device_id();
            let outcome = items
                .remove(ticket.session_id())
                .unwrap_or_else(|| Err("missing from bulk response".to_string()))
                .map_err(DomainError::Rejected);
            match ticket.complete(outcome) {
                Ok(()) => result.record_success(),
                Err(e) => result.record_failure(device_id, e.to_string()),
            }
        }
        result
    }

    /// Create tiles for visible devices, detach hidden ones, and retire
    /// hidden tiles that hold nothing worth keeping
    fn refresh_visible(&self, state: &mut GridState) {
        let visible_ids: Vec<DeviceId> = visible(state).into_iter().map(Device::id).collect();
        let visible_set: HashSet<DeviceId> = visible_ids.iter().copied().collect();

        let hidden: Vec<DeviceId> = state
            .controllers
            .keys()
            .filter(|id| !visible_set.contains(id))
            .copied()
            .collect();
        for id in hidden {
            let Some(controller) = state.controllers.get(&id).cloned() else {
                continue;
            };
            controller.detach_view();
            let keep = controller.state().holds_session() || controller.stale_session().is_some();
            if !keep {
                controller.retire();
                state.controllers.remove(&id);
            }
        }

        for id in visible_ids {
            let controller = match state.controllers.get(&id) {
                Some(controller) => Arc::clone(controller),
                None => {
                    let controller = self.create_controller(id);
                    state.controllers.insert(id, Arc::clone(&controller));
                    controller
                }
            };
            controller.attach_view();
        }
    }

    fn create_controller(&self, device_id: DeviceId) -> Arc<SessionController> {
        let adapter = PlaybackAdapter::new(
            self.surfaces.surface_for(device_id),
            Arc::clone(&self.engines),
            self.playback.clone(),
        );
        debug!(device_id = %device_id, "Creating tile");
        SessionController::new(
            self.template.for_device(device_id),
            Arc::clone(&self.backend),
            adapter,
            Arc::clone(&self.observer),
            Arc::clone(&self.metrics),
        )
    }
}

fn visible(state: &GridState) -> Vec<&Device> {
    state
        .devices
        .iter()
        .filter(|device| state.filter.map_or(true, |id| device.id() == id))
        .take(state.arity.capacity())
        .collect()
}
