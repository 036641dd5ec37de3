use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::MutexGuard as OpsGuard;
use tracing::{debug, info, warn};

use super::lock_unpoisoned;
use super::playback_adapter::PlaybackAdapter;
use crate::domain::entities::{ControllerLifecycle, StreamSession};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{MetricsReporter, PlaybackListener, StreamBackend, StreamObserver};
use crate::domain::value_objects::{
    ControllerState, DeviceId, PlaybackEvent, PlaybackHandle, PlaybackLocator, StreamRequest,
};

/// Point-in-time view of one tile, for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct TileSnapshot {
    pub device_id: DeviceId,
    pub state: ControllerState,
    pub session_id: Option<String>,
    pub locator: Option<PlaybackLocator>,
    pub failure: Option<String>,
    pub view_attached: bool,
    pub bound: bool,
    pub ready: bool,
    pub stale_session: Option<String>,
    /// Time since the tile last went Live, while it still is
    pub live_for: Option<Duration>,
    pub transitions: usize,
}

#[derive(Default)]
struct ControllerInner {
    lifecycle: ControllerLifecycle,
    pending: Option<StreamRequest>,
    session: Option<StreamSession>,
    failure: Option<String>,
    handle: Option<PlaybackHandle>,
    view_attached: bool,
    ready: bool,
    stale_session: Option<String>,
}

/// Per-camera state machine coordinating backend start/stop with one
/// playback adapter.
///
/// Backend operations are serialized by an async operation lock. The state
/// lock is only held for short synchronous sections and never while calling
/// into the adapter. Lock order: binding, then adapter, then state.
pub struct SessionController {
    device_id: DeviceId,
    request: StreamRequest,
    backend: Arc<dyn StreamBackend>,
    adapter: PlaybackAdapter,
    observer: Arc<dyn StreamObserver>,
    metrics: Arc<dyn MetricsReporter>,
    inner: Mutex<ControllerInner>,
    ops: tokio::sync::Mutex<()>,
    binding: Mutex<()>,
    retired: AtomicBool,
    me: Weak<SessionController>,
}

/// A start that has entered `Requesting` and holds the operation lock
/// until its backend result is applied
pub struct StartTicket<'a> {
    controller: &'a SessionController,
    request: StreamRequest,
    _ops: OpsGuard<'a, ()>,
}

impl StartTicket<'_> {
    pub fn request(&self) -> &StreamRequest {
        &self.request
    }

    pub fn complete(self, result: Result<StreamSession>) -> Result<()> {
        self.controller.finish_start(&self.request, result)
    }
}

/// A stop that has entered `Stopping` and holds the operation lock
pub struct StopTicket<'a> {
    controller: &'a SessionController,
    session_id: String,
    _ops: OpsGuard<'a, ()>,
}

impl StopTicket<'_> {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn device_id(&self) -> DeviceId {
        self.controller.device_id
    }

    pub fn complete(self, result: Result<()>) -> Result<()> {
        self.controller.finish_stop(&self.session_id, result)
    }
}

impl SessionController {
    /// `request` is the stream this tile shows; its device owns the tile
    pub fn new(
        request: StreamRequest,
        backend: Arc<dyn StreamBackend>,
        adapter: PlaybackAdapter,
        observer: Arc<dyn StreamObserver>,
        metrics: Arc<dyn MetricsReporter>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me: &Weak<SessionController>| {
            let listener: Weak<dyn PlaybackListener> = me.clone();
            adapter.set_listener(listener);
            Self {
                device_id: request.device_id(),
                request,
                backend,
                adapter,
                observer,
                metrics,
                inner: Mutex::new(ControllerInner::default()),
                ops: tokio::sync::Mutex::new(()),
                binding: Mutex::new(()),
                retired: AtomicBool::new(false),
                me: me.clone(),
            }
        })
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn request(&self) -> StreamRequest {
        self.request
    }

    pub fn state(&self) -> ControllerState {
        lock_unpoisoned(&self.inner).lifecycle.current_state()
    }

    pub fn session(&self) -> Option<StreamSession> {
        lock_unpoisoned(&self.inner).session.clone()
    }

    pub fn failure(&self) -> Option<String> {
        lock_unpoisoned(&self.inner).failure.clone()
    }

    pub fn stale_session(&self) -> Option<String> {
        lock_unpoisoned(&self.inner).stale_session.clone()
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }

    pub fn adapter(&self) -> &PlaybackAdapter {
        &self.adapter
    }

    pub fn snapshot(&self) -> TileSnapshot {
        let inner = lock_unpoisoned(&self.inner);
        TileSnapshot {
            device_id: self.device_id,
            state: inner.lifecycle.current_state(),
            session_id: inner.session.as_ref().map(|s| s.id().to_string()),
            locator: inner.session.as_ref().map(|s| s.locator().clone()),
            failure: inner.failure.clone(),
            view_attached: inner.view_attached,
            bound: inner.handle.is_some(),
            ready: inner.ready,
            stale_session: inner.stale_session.clone(),
            live_for: inner.lifecycle.live_duration(),
            transitions: inner.lifecycle.transition_count(),
        }
    }

    /// Start the stream, or do nothing when one is already requested or live.
    /// Starting from `Error` is an explicit retry and dismisses the failure.
    pub async fn start(&self, request: StreamRequest) -> Result<()> {
        let Some(ticket) = self.begin_start(request).await? else {
            return Ok(());
        };
        let result = self.backend.start_stream(ticket.request()).await;
        ticket.complete(result)
    }

    /// Enter `Requesting` without issuing the backend call. `None` when the
    /// start is a no-op.
    pub async fn begin_start(&self, request: StreamRequest) -> Result<Option<StartTicket<'_>>> {
        if request.device_id() != self.device_id {
            return Err(DomainError::DeviceMismatch {
                owner: self.device_id,
                requested: request.device_id(),
            });
        }
        self.ensure_active()?;
        if matches!(self.state(), ControllerState::Requesting | ControllerState::Live) {
            return Ok(None);
        }

        let ops = self.ops.lock().await;
        self.ensure_active()?;

        let mut inner = lock_unpoisoned(&self.inner);
        match inner.lifecycle.current_state() {
            ControllerState::Idle => {}
            ControllerState::Error => {
                inner.failure = None;
                self.apply(&mut inner, ControllerState::Idle, Some("retry".to_string()))?;
            }
            _ => return Ok(None),
        }
        self.apply(&mut inner, ControllerState::Requesting, None)?;
        inner.pending = Some(request);

        Ok(Some(StartTicket {
            controller: self,
            request,
            _ops: ops,
        }))
    }

    fn finish_start(&self, request: &StreamRequest, result: Result<StreamSession>) -> Result<()> {
        if self.is_retired() {
            debug!(device_id = %self.device_id, "Discarding start result for retired tile");
            return Err(DomainError::ControllerRetired(self.device_id));
        }

        let mut inner = lock_unpoisoned(&self.inner);
        inner.pending = None;
        match result {
            Ok(session) => {
                info!(
                    device_id = %self.device_id,
                    session_id = %session.id(),
                    channel = request.channel(),
                    "Stream started"
                );
                inner.session = Some(session.clone());
                self.apply(&mut inner, ControllerState::Live, None)?;
                drop(inner);

                self.observer.on_stream_start(&session);
                self.sync_binding();
                Ok(())
            }
            Err(e) => {
                warn!(device_id = %self.device_id, "Stream start failed: {}", e);
                inner.failure = Some(e.to_string());
                self.apply(&mut inner, ControllerState::Error, Some(e.to_string()))?;
                self.metrics.report_start_failure();
                Err(e)
            }
        }
    }

    /// Stop the live session. No-op from `Idle` and `Error`; waits for an
    /// outstanding start to settle first.
    pub async fn stop(&self) -> Result<()> {
        let Some(ticket) = self.begin_stop().await else {
            return Ok(());
        };
        let result = self.backend.stop_stream(ticket.session_id()).await;
        ticket.complete(result)
    }

    /// Enter `Stopping` and release the binding. `None` when nothing is live.
    pub async fn begin_stop(&self) -> Option<StopTicket<'_>> {
        if matches!(self.state(), ControllerState::Idle | ControllerState::Error) {
            return None;
        }

        let ops = self.ops.lock().await;
        let session_id = {
            let mut inner = lock_unpoisoned(&self.inner);
            if inner.lifecycle.current_state() != ControllerState::Live {
                return None;
            }
            let session_id = inner.session.as_ref()?.id().to_string();
            self.apply(&mut inner, ControllerState::Stopping, None).ok()?;
            session_id
        };
        self.sync_binding();

        Some(StopTicket {
            controller: self,
            session_id,
            _ops: ops,
        })
    }

    fn finish_stop(&self, session_id: &str, result: Result<()>) -> Result<()> {
        if self.is_retired() {
            debug!(device_id = %self.device_id, session_id, "Discarding stop result for retired tile");
            if result.is_ok() {
                self.observer.on_stream_stop(session_id);
            }
            return result;
        }

        let mut inner = lock_unpoisoned(&self.inner);
        inner.session = None;
        match result {
            Ok(()) => {
                info!(device_id = %self.device_id, session_id, "Stream stopped");
                self.apply(&mut inner, ControllerState::Idle, None)?;
                drop(inner);
                self.observer.on_stream_stop(session_id);
                Ok(())
            }
            Err(e) => {
                warn!(device_id = %self.device_id, session_id, "Stream stop failed: {}", e);
                inner.failure = Some(e.to_string());
                inner.stale_session = Some(session_id.to_string());
                self.apply(&mut inner, ControllerState::Error, Some(e.to_string()))?;
                self.metrics.report_stop_failure();
                Err(e)
            }
        }
    }

    /// Leave `Error` for `Idle`, clearing the failure reason
    pub fn dismiss(&self) -> bool {
        let mut inner = lock_unpoisoned(&self.inner);
        if inner.lifecycle.current_state() != ControllerState::Error {
            return false;
        }
        inner.failure = None;
        self.apply(&mut inner, ControllerState::Idle, Some("dismissed".to_string()))
            .is_ok()
    }

    /// Show the tile: bind playback if a session is live
    pub fn attach_view(&self) {
        lock_unpoisoned(&self.inner).view_attached = true;
        self.sync_binding();
    }

    /// Hide the tile: release playback, keep the backend session
    pub fn detach_view(&self) {
        lock_unpoisoned(&self.inner).view_attached = false;
        self.sync_binding();
    }

    /// Tear the tile down. Unbinds synchronously; late backend results are discarded.
    pub fn retire(&self) {
        if self.retired.swap(true, Ordering::SeqCst) {
            return;
        }
        lock_unpoisoned(&self.inner).view_attached = false;
        self.sync_binding();
        debug!(device_id = %self.device_id, "Tile retired");
    }

    /// Take over a session found in the backend registry. Only from `Idle`
    /// and only when no operation is in flight.
    pub fn adopt(&self, session: StreamSession) -> bool {
        if self.is_retired() || session.device_id() != self.device_id {
            return false;
        }
        let Ok(_ops) = self.ops.try_lock() else {
            return false;
        };

        {
            let mut inner = lock_unpoisoned(&self.inner);
            if inner.lifecycle.current_state() != ControllerState::Idle {
                return false;
            }
            info!(device_id = %self.device_id, session_id = %session.id(), "Adopting active session");
            inner.session = Some(session);
            if self
                .apply(&mut inner, ControllerState::Live, Some("adopted".to_string()))
                .is_err()
            {
                inner.session = None;
                return false;
            }
        }
        self.sync_binding();
        true
    }

    /// Drop a live session the registry no longer lists. Sessions started
    /// after `fetched_at` are kept since the registry could not know them.
    pub fn release_if_absent(&self, registry: &HashSet<String>, fetched_at: DateTime<Utc>) -> bool {
        let Ok(_ops) = self.ops.try_lock() else {
            return false;
        };

        let session_id = {
            let mut inner = lock_unpoisoned(&self.inner);
            if inner.lifecycle.current_state() != ControllerState::Live {
                return false;
            }
            let Some(session) = inner.session.as_ref() else {
                return false;
            };
            if registry.contains(session.id()) || session.started_at() > fetched_at {
                return false;
            }
            let session_id = session.id().to_string();
            inner.session = None;
            if self
                .apply(&mut inner, ControllerState::Idle, Some("session no longer active".to_string()))
                .is_err()
            {
                return false;
            }
            session_id
        };

        info!(device_id = %self.device_id, session_id = %session_id, "Released orphaned session");
        self.sync_binding();
        self.observer.on_stream_stop(&session_id);
        true
    }

    /// Clear the stale-session flag once the registry no longer lists it
    pub fn clear_stale_if_absent(&self, registry: &HashSet<String>) -> bool {
        let mut inner = lock_unpoisoned(&self.inner);
        match inner.stale_session.as_deref() {
            Some(stale) if !registry.contains(stale) => {
                debug!(device_id = %self.device_id, session_id = stale, "Cleared stale session");
                inner.stale_session = None;
                true
            }
            _ => false,
        }
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_retired() {
            return Err(DomainError::ControllerRetired(self.device_id));
        }
        Ok(())
    }

    fn apply(
        &self,
        inner: &mut ControllerInner,
        to: ControllerState,
        reason: Option<String>,
    ) -> Result<()> {
        let from = inner.lifecycle.current_state();
        inner.lifecycle.transition(to, reason)?;
        if to != ControllerState::Live {
            inner.ready = false;
        }
        self.metrics.report_transition(from, to);
        debug!(device_id = %self.device_id, state = %to, "{} -> {}", from, to);
        Ok(())
    }

    /// Bring the adapter in line with the tile: bound exactly when live,
    /// attached and not retired.
    fn sync_binding(&self) {
        let _binding = lock_unpoisoned(&self.binding);

        let (desired, current) = {
            let mut inner = lock_unpoisoned(&self.inner);
            let wants_playback = inner.view_attached
                && !self.is_retired()
                && inner.lifecycle.current_state() == ControllerState::Live;
            let desired = inner
                .session
                .as_ref()
                .filter(|_| wants_playback)
                .map(|s| s.locator().clone());
            let mut current = inner.handle.clone();
            if desired.is_some() && current.as_ref().map(|h| h.locator()) != desired.as_ref() {
                // Events from the replacement binding may arrive before its handle is stored
                inner.handle = None;
                inner.ready = false;
                current = None;
            }
            (desired, current)
        };

        match (desired, current) {
            (Some(locator), Some(handle)) if handle.locator() == &locator => {}
            (Some(locator), _) => match self.adapter.bind(&locator) {
                Ok(handle) => {
                    let mut inner = lock_unpoisoned(&self.inner);
                    if inner.lifecycle.current_state() == ControllerState::Live {
                        inner.handle = Some(handle);
                    } else {
                        drop(inner);
                        self.adapter.unbind();
                    }
                }
                Err(e) => {
                    lock_unpoisoned(&self.inner).handle = None;
                    self.fail_playback(e.to_string());
                }
            },
            (None, _) => {
                if self.adapter.unbind() {
                    debug!(device_id = %self.device_id, "Playback unbound");
                }
                let mut inner = lock_unpoisoned(&self.inner);
                inner.handle = None;
                inner.ready = false;
            }
        }
    }

    /// Live -> Error on a terminal playback failure, then stop the backend
    /// session in the background.
    fn fail_playback(&self, reason: String) {
        let session_id = {
            let mut inner = lock_unpoisoned(&self.inner);
            if inner.lifecycle.current_state() != ControllerState::Live {
                return;
            }
            let session = inner.session.take();
            inner.handle = None;
            inner.failure = Some(reason.clone());
            if self
                .apply(&mut inner, ControllerState::Error, Some(reason.clone()))
                .is_err()
            {
                return;
            }
            session.map(|s| s.id().to_string())
        };

        warn!(device_id = %self.device_id, "Playback failed: {}", reason);
        self.metrics.report_playback_fatal();
        if let Some(session_id) = session_id {
            self.spawn_background_stop(session_id);
        }
    }

    fn spawn_background_stop(&self, session_id: String) {
        let me = self.me.clone();
        tokio::spawn(async move {
            let Some(controller) = me.upgrade() else {
                return;
            };
            let _ops = controller.ops.lock().await;
            match controller.backend.stop_stream(&session_id).await {
                Ok(()) => {
                    debug!(device_id = %controller.device_id, session_id = %session_id, "Background stop completed");
                    controller.observer.on_stream_stop(&session_id);
                }
                Err(e) => {
                    warn!(device_id = %controller.device_id, session_id = %session_id, "Background stop failed: {}", e);
                    lock_unpoisoned(&controller.inner).stale_session = Some(session_id);
                }
            }
        });
    }
}

impl PlaybackListener for SessionController {
    fn on_playback_event(&self, handle: &PlaybackHandle, event: PlaybackEvent) {
        let is_current = {
            let inner = lock_unpoisoned(&self.inner);
            inner
                .handle
                .as_ref()
                .map_or(true, |current| current.id() == handle.id())
        };
        if !is_current {
            return;
        }

        match event {
            PlaybackEvent::Ready => {
                let mut inner = lock_unpoisoned(&self.inner);
                if inner.lifecycle.current_state() == ControllerState::Live {
                    inner.ready = true;
                }
            }
            PlaybackEvent::Buffering => {
                debug!(device_id = %self.device_id, "Playback buffering");
            }
            PlaybackEvent::Ended => {
                info!(device_id = %self.device_id, "Playback reached end of stream");
            }
            PlaybackEvent::Failed(failure) => self.fail_playback(failure.to_string()),
        }
    }
}
