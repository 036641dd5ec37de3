#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OwnedMutexGuard;

use videowall_client::domain::ports::{
    AdaptiveEngine, BulkStartItem, BulkStopItem, DisplaySurface, EngineEvent, EngineEventSender,
    EngineFactory, MetricsReporter, StreamBackend, StreamObserver,
};
use videowall_client::{
    ActiveStream, BulkOperationResult, ControllerState, Device, DeviceId, DomainError,
    PlaybackLocator, PlaybackOptions, ReconcileReport, Result, StreamRequest, StreamSession,
};

pub fn locator_for(session_id: &str) -> PlaybackLocator {
    PlaybackLocator::parse(&format!("http://vms.test/hls/{session_id}/stream.m3u8")).unwrap()
}

pub fn devices(count: u64) -> Vec<Device> {
    (1..=count)
        .map(|id| Device::new(id, format!("Camera {id}")))
        .collect()
}

pub fn active_entry(device_id: u64, session_id: &str, started_at: DateTime<Utc>) -> ActiveStream {
    ActiveStream {
        session_id: session_id.to_string(),
        locator: locator_for(session_id),
        started_at,
        duration: Duration::from_secs(3600),
        device_id: Some(DeviceId(device_id)),
        channel: Some(1),
        sub_stream: Some(0),
    }
}

#[derive(Default)]
struct BackendState {
    next_id: u64,
    active: Vec<ActiveStream>,
    devices: Vec<Device>,
    start_calls: Vec<DeviceId>,
    stop_calls: Vec<String>,
    bulk_start_calls: usize,
    bulk_stop_calls: usize,
    active_calls: usize,
    failing_devices: HashSet<DeviceId>,
    failing_stops: bool,
    registry_down: bool,
}

/// In-memory backend keeping its own active-stream registry
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<BackendState>,
    start_gate: Arc<tokio::sync::Mutex<()>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_devices(devices: Vec<Device>) -> Arc<Self> {
        let backend = Self::default();
        backend.state.lock().unwrap().devices = devices;
        Arc::new(backend)
    }

    /// Block `start_stream` until the returned guard is dropped
    pub async fn hold_starts(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.start_gate).lock_owned().await
    }

    pub fn fail_device(&self, device_id: u64) {
        self.state.lock().unwrap().failing_devices.insert(DeviceId(device_id));
    }

    pub fn recover_device(&self, device_id: u64) {
        self.state.lock().unwrap().failing_devices.remove(&DeviceId(device_id));
    }

    pub fn fail_stops(&self, failing: bool) {
        self.state.lock().unwrap().failing_stops = failing;
    }

    pub fn set_registry_down(&self, down: bool) {
        self.state.lock().unwrap().registry_down = down;
    }

    pub fn insert_active(&self, entry: ActiveStream) {
        self.state.lock().unwrap().active.push(entry);
    }

    /// Drop a session from the registry behind the client's back
    pub fn expire(&self, session_id: &str) {
        self.state.lock().unwrap().active.retain(|e| e.session_id != session_id);
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.state.lock().unwrap().active.iter().map(|e| e.session_id.clone()).collect()
    }

    pub fn start_calls(&self) -> usize {
        self.state.lock().unwrap().start_calls.len()
    }

    pub fn stop_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().stop_calls.clone()
    }

    pub fn bulk_start_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_start_calls
    }

    pub fn bulk_stop_calls(&self) -> usize {
        self.state.lock().unwrap().bulk_stop_calls
    }

    pub fn active_calls(&self) -> usize {
        self.state.lock().unwrap().active_calls
    }

    fn create_session(&self, request: &StreamRequest) -> std::result::Result<StreamSession, String> {
        let mut state = self.state.lock().unwrap();
        if state.failing_devices.contains(&request.device_id()) {
            return Err(format!("device {} unreachable", request.device_id()));
        }
        state.next_id += 1;
        let session_id = format!("sess-{}", state.next_id);
        let started_at = Utc::now();
        let mut entry = active_entry(request.device_id().0, &session_id, started_at);
        entry.channel = Some(request.channel());
        entry.sub_stream = Some(request.sub_stream());
        state.active.push(entry);
        Ok(StreamSession::started(
            session_id.clone(),
            request,
            locator_for(&session_id),
            started_at,
        ))
    }

    fn remove_session(&self, session_id: &str) -> std::result::Result<(), String> {
        let mut state = self.state.lock().unwrap();
        if state.failing_stops {
            return Err("recorder did not answer".to_string());
        }
        state.active.retain(|e| e.session_id != session_id);
        Ok(())
    }
}

#[async_trait]
impl StreamBackend for FakeBackend {
    async fn start_stream(&self, request: &StreamRequest) -> Result<StreamSession> {
        self.state.lock().unwrap().start_calls.push(request.device_id());
        drop(self.start_gate.lock().await);
        self.create_session(request).map_err(|reason| DomainError::Backend {
            status: 502,
            reason,
        })
    }

    async fn stop_stream(&self, session_id: &str) -> Result<()> {
        self.state.lock().unwrap().stop_calls.push(session_id.to_string());
        self.remove_session(session_id).map_err(|reason| DomainError::Backend {
            status: 500,
            reason,
        })
    }

    async fn bulk_start(&self, requests: &[StreamRequest]) -> Result<Vec<BulkStartItem>> {
        self.state.lock().unwrap().bulk_start_calls += 1;
        Ok(requests
            .iter()
            .map(|request| BulkStartItem {
                device_id: request.device_id(),
                outcome: self.create_session(request),
            })
            .collect())
    }

    async fn bulk_stop(&self, session_ids: &[String]) -> Result<Vec<BulkStopItem>> {
        self.state.lock().unwrap().bulk_stop_calls += 1;
        Ok(session_ids
            .iter()
            .map(|id| BulkStopItem {
                session_id: id.clone(),
                outcome: self.remove_session(id),
            })
            .collect())
    }

    async fn active_streams(&self) -> Result<Vec<ActiveStream>> {
        let mut state = self.state.lock().unwrap();
        state.active_calls += 1;
        if state.registry_down {
            return Err(DomainError::Transport("connection refused".to_string()));
        }
        Ok(state.active.clone())
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.state.lock().unwrap().devices.clone())
    }
}

#[derive(Default)]
pub struct EngineCounters {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    senders: Mutex<Vec<EngineEventSender>>,
}

impl EngineCounters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Engines loaded and not yet destroyed
    pub fn alive(&self) -> usize {
        self.created() - self.destroyed()
    }

    /// Push an event through the most recently loaded engine
    pub fn emit(&self, event: EngineEvent) {
        if let Some(sender) = self.senders.lock().unwrap().last() {
            let _ = sender.send(event);
        }
    }

    /// Close every engine's event channel as if its task had died
    pub fn drop_senders(&self) {
        self.senders.lock().unwrap().clear();
    }

    /// Push an event through the engine loaded `index`-th
    pub fn emit_to(&self, index: usize, event: EngineEvent) {
        if let Some(sender) = self.senders.lock().unwrap().get(index) {
            let _ = sender.send(event);
        }
    }
}

struct FakeEngine {
    counters: Arc<EngineCounters>,
    auto_ready: bool,
    loaded: bool,
}

impl AdaptiveEngine for FakeEngine {
    fn load(
        &mut self,
        _locator: &PlaybackLocator,
        _surface: Arc<dyn DisplaySurface>,
        events: EngineEventSender,
    ) {
        if self.auto_ready {
            let _ = events.send(EngineEvent::ManifestParsed);
        }
        self.counters.senders.lock().unwrap().push(events);
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        self.loaded = true;
    }

    fn destroy(&mut self) {
        if std::mem::take(&mut self.loaded) {
            self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Engine factory whose engines only relay injected events
pub struct FakeEngines {
    supported: bool,
    auto_ready: bool,
    pub counters: Arc<EngineCounters>,
}

impl FakeEngines {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            auto_ready: true,
            counters: Arc::new(EngineCounters::default()),
        })
    }

    pub fn silent() -> Arc<Self> {
        Arc::new(Self {
            supported: true,
            auto_ready: false,
            counters: Arc::new(EngineCounters::default()),
        })
    }

    pub fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            supported: false,
            auto_ready: false,
            counters: Arc::new(EngineCounters::default()),
        })
    }
}

impl EngineFactory for FakeEngines {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self, _options: &PlaybackOptions) -> Box<dyn AdaptiveEngine> {
        Box::new(FakeEngine {
            counters: Arc::clone(&self.counters),
            auto_ready: self.auto_ready,
            loaded: false,
        })
    }
}

#[derive(Default)]
pub struct RecordingMetrics {
    pub transitions: Mutex<Vec<(ControllerState, ControllerState)>>,
    pub start_failures: AtomicUsize,
    pub stop_failures: AtomicUsize,
    pub playback_fatal: AtomicUsize,
    pub reconciles: Mutex<Vec<ReconcileReport>>,
    pub bulk: Mutex<Vec<(String, BulkOperationResult)>>,
}

impl MetricsReporter for RecordingMetrics {
    fn report_transition(&self, from: ControllerState, to: ControllerState) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn report_start_failure(&self) {
        self.start_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn report_stop_failure(&self) {
        self.stop_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn report_playback_fatal(&self) {
        self.playback_fatal.fetch_add(1, Ordering::SeqCst);
    }

    fn report_reconcile(&self, report: &ReconcileReport) {
        self.reconciles.lock().unwrap().push(report.clone());
    }

    fn report_bulk_operation(&self, operation: &str, result: &BulkOperationResult) {
        self.bulk
            .lock()
            .unwrap()
            .push((operation.to_string(), result.clone()));
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    pub started: Mutex<Vec<String>>,
    pub stopped: Mutex<Vec<String>>,
}

impl StreamObserver for RecordingObserver {
    fn on_stream_start(&self, session: &StreamSession) {
        self.started.lock().unwrap().push(session.id().to_string());
    }

    fn on_stream_stop(&self, session_id: &str) {
        self.stopped.lock().unwrap().push(session_id.to_string());
    }
}

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

pub async fn settle<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("future settled in time")
}
