use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;
use uuid::Uuid;

use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{DisplaySurface, MediaSegment, SurfaceProvider, HLS_MIME_TYPE};
use crate::domain::value_objects::{DeviceId, PlaybackLocator};

#[derive(Default)]
struct SurfaceState {
    holder: Option<Uuid>,
    source: Option<PlaybackLocator>,
    muted: bool,
    playing: bool,
    buffer: VecDeque<MediaSegment>,
    buffered: Duration,
    appended: u64,
    attachments: u64,
}

/// In-memory display surface: keeps a bounded back buffer of appended
/// segments and models native HLS support and autoplay permission
pub struct HeadlessSurface {
    id: Uuid,
    native_hls: bool,
    autoplay_allowed: bool,
    state: Mutex<SurfaceState>,
}

impl HeadlessSurface {
    pub fn new(native_hls: bool, autoplay_allowed: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            native_hls,
            autoplay_allowed,
            state: Mutex::new(SurfaceState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SurfaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn holder(&self) -> Option<Uuid> {
        self.state().holder
    }

    pub fn source(&self) -> Option<PlaybackLocator> {
        self.state().source.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    pub fn is_muted(&self) -> bool {
        self.state().muted
    }

    /// Segments appended since creation
    pub fn segments_appended(&self) -> u64 {
        self.state().appended
    }

    pub fn buffered_segments(&self) -> Vec<u64> {
        self.state().buffer.iter().map(|s| s.sequence).collect()
    }

    pub fn buffered_duration(&self) -> Duration {
        self.state().buffered
    }

    /// Number of times a handle claimed this surface
    pub fn attachments(&self) -> u64 {
        self.state().attachments
    }
}

impl DisplaySurface for HeadlessSurface {
    fn id(&self) -> Uuid {
        self.id
    }

    fn can_play_natively(&self, mime_type: &str) -> bool {
        self.native_hls && mime_type == HLS_MIME_TYPE
    }

    fn attach(&self, handle: Uuid) -> Result<()> {
        let mut state = self.state();
        if state.holder.is_some() {
            return Err(DomainError::SurfaceBusy);
        }
        state.holder = Some(handle);
        state.attachments += 1;
        Ok(())
    }

    fn detach(&self, handle: Uuid) {
        let mut state = self.state();
        if state.holder != Some(handle) {
            return;
        }
        state.holder = None;
        state.playing = false;
        state.buffer.clear();
        state.buffered = Duration::ZERO;
    }

    fn set_source(&self, locator: Option<&PlaybackLocator>) {
        let mut state = self.state();
        state.source = locator.cloned();
        if state.source.is_none() {
            state.playing = false;
        }
    }

    fn set_muted(&self, muted: bool) {
        self.state().muted = muted;
    }

    fn play(&self) -> Result<()> {
        let mut state = self.state();
        if !self.autoplay_allowed && !state.muted {
            return Err(DomainError::AutoplayRejected);
        }
        state.playing = true;
        Ok(())
    }

    fn append_segment(&self, segment: MediaSegment) {
        let mut state = self.state();
        if state.holder.is_none() {
            return;
        }
        trace!(surface = %self.id, sequence = segment.sequence, "Segment appended");
        state.buffered += segment.duration;
        state.appended += 1;
        state.buffer.push_back(segment);
    }

    fn trim_back_buffer(&self, back_buffer: Duration) {
        let mut state = self.state();
        while state.buffered > back_buffer && state.buffer.len() > 1 {
            if let Some(oldest) = state.buffer.pop_front() {
                state.buffered = state.buffered.saturating_sub(oldest.duration);
            }
        }
    }
}

/// Hands out one headless surface per device, reused across tile lifetimes
pub struct HeadlessSurfaceProvider {
    native_hls: bool,
    autoplay_allowed: bool,
    surfaces: Mutex<HashMap<DeviceId, Arc<HeadlessSurface>>>,
}

impl HeadlessSurfaceProvider {
    pub fn new(native_hls: bool, autoplay_allowed: bool) -> Self {
        Self {
            native_hls,
            autoplay_allowed,
            surfaces: Mutex::new(HashMap::new()),
        }
    }

    pub fn surface(&self, device_id: DeviceId) -> Option<Arc<HeadlessSurface>> {
        self.surfaces
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&device_id)
            .cloned()
    }
}

impl SurfaceProvider for HeadlessSurfaceProvider {
    fn surface_for(&self, device_id: DeviceId) -> Arc<dyn DisplaySurface> {
        let mut surfaces = self.surfaces.lock().unwrap_or_else(PoisonError::into_inner);
        let surface = surfaces
            .entry(device_id)
            .or_insert_with(|| Arc::new(HeadlessSurface::new(self.native_hls, self.autoplay_allowed)));
        Arc::clone(surface) as Arc<dyn DisplaySurface>
    }
}
