use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::lock_unpoisoned;
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{
    AdaptiveEngine, DisplaySurface, EngineEvent, EngineFactory, PlaybackListener, HLS_MIME_TYPE,
};
use crate::domain::value_objects::{
    PlaybackEvent, PlaybackFailure, PlaybackHandle, PlaybackLocator, PlaybackMode, PlaybackOptions,
};

struct ActiveBinding {
    handle: PlaybackHandle,
    generation: u64,
    engine: Option<Box<dyn AdaptiveEngine>>,
    pump: Option<JoinHandle<()>>,
    ready: bool,
}

#[derive(Default)]
struct AdapterShared {
    generation: u64,
    binding: Option<ActiveBinding>,
    listener: Option<Weak<dyn PlaybackListener>>,
}

impl AdapterShared {
    fn is_current(&self, generation: u64) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|binding| binding.generation == generation)
    }

    fn deliver(&self, handle: &PlaybackHandle, event: PlaybackEvent) {
        if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
            listener.on_playback_event(handle, event);
        }
    }
}

/// Owns at most one playback engine bound to one display surface.
///
/// Events are delivered with the binding lock held and only for the current
/// binding generation, so nothing reaches the listener for a locator once
/// `unbind` (or a rebind) has returned.
pub struct PlaybackAdapter {
    surface: Arc<dyn DisplaySurface>,
    engines: Arc<dyn EngineFactory>,
    options: PlaybackOptions,
    shared: Arc<Mutex<AdapterShared>>,
}

impl PlaybackAdapter {
    pub fn new(
        surface: Arc<dyn DisplaySurface>,
        engines: Arc<dyn EngineFactory>,
        options: PlaybackOptions,
    ) -> Self {
        Self {
            surface,
            engines,
            options,
            shared: Arc::new(Mutex::new(AdapterShared::default())),
        }
    }

    pub fn set_listener(&self, listener: Weak<dyn PlaybackListener>) {
        lock_unpoisoned(&self.shared).listener = Some(listener);
    }

    pub fn surface(&self) -> &Arc<dyn DisplaySurface> {
        &self.surface
    }

    pub fn current_handle(&self) -> Option<PlaybackHandle> {
        lock_unpoisoned(&self.shared)
            .binding
            .as_ref()
            .map(|binding| binding.handle.clone())
    }

    pub fn is_bound(&self) -> bool {
        lock_unpoisoned(&self.shared).binding.is_some()
    }

    /// Whether the current binding has reported `Ready`
    pub fn is_ready(&self) -> bool {
        lock_unpoisoned(&self.shared)
            .binding
            .as_ref()
            .is_some_and(|binding| binding.ready)
    }

    /// Bind `locator` to the surface, releasing any previous binding first.
    ///
    /// Prefers the adaptive engine, falls back to native playback, and fails
    /// with `UnsupportedEnvironment` when neither is available.
    pub fn bind(&self, locator: &PlaybackLocator) -> Result<PlaybackHandle> {
        let mut shared = lock_unpoisoned(&self.shared);
        release_binding(&mut shared, self.surface.as_ref(), "rebind");

        shared.generation += 1;
        let generation = shared.generation;

        if self.engines.is_supported() {
            let handle = PlaybackHandle::new(self.surface.id(), locator.clone(), PlaybackMode::Adaptive);
            self.surface.attach(handle.id())?;
            self.surface.set_muted(self.options.muted());

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let mut engine = self.engines.create(&self.options);
            engine.load(locator, Arc::clone(&self.surface), events_tx);

            let pump = tokio::spawn(pump_events(
                Arc::downgrade(&self.shared),
                Arc::clone(&self.surface),
                generation,
                handle.clone(),
                self.options.autoplay(),
                events_rx,
            ));

            shared.binding = Some(ActiveBinding {
                handle: handle.clone(),
                generation,
                engine: Some(engine),
                pump: Some(pump),
                ready: false,
            });
            info!(handle = %handle.id(), locator = %locator, "Bound adaptive engine");
            return Ok(handle);
        }

        if self.surface.can_play_natively(HLS_MIME_TYPE) {
            let handle = PlaybackHandle::new(self.surface.id(), locator.clone(), PlaybackMode::Native);
            self.surface.attach(handle.id())?;
            self.surface.set_muted(self.options.muted());
            self.surface.set_source(Some(locator));
            if self.options.autoplay() {
                if let Err(e) = self.surface.play() {
                    debug!(handle = %handle.id(), "Autoplay not started: {}", e);
                }
            }

            shared.binding = Some(ActiveBinding {
                handle: handle.clone(),
                generation,
                engine: None,
                pump: None,
                ready: true,
            });
            info!(handle = %handle.id(), locator = %locator, "Bound native playback");
            shared.deliver(&handle, PlaybackEvent::Ready);
            return Ok(handle);
        }

        warn!(locator = %locator, "No playback path available for surface {}", self.surface.id());
        Err(DomainError::Playback(PlaybackFailure::UnsupportedEnvironment))
    }

    /// Release the current binding. Returns whether anything was bound.
    pub fn unbind(&self) -> bool {
        let mut shared = lock_unpoisoned(&self.shared);
        release_binding(&mut shared, self.surface.as_ref(), "unbind")
    }
}

impl Drop for PlaybackAdapter {
    fn drop(&mut self) {
        let mut shared = lock_unpoisoned(&self.shared);
        release_binding(&mut shared, self.surface.as_ref(), "drop");
    }
}

fn release_binding(shared: &mut AdapterShared, surface: &dyn DisplaySurface, cause: &str) -> bool {
    let Some(mut binding) = shared.binding.take() else {
        return false;
    };

    if let Some(mut engine) = binding.engine.take() {
        engine.destroy();
    }
    if let Some(pump) = binding.pump.take() {
        pump.abort();
    }
    surface.set_source(None);
    surface.detach(binding.handle.id());

    debug!(handle = %binding.handle.id(), cause, "Released playback binding");
    true
}

async fn pump_events(
    shared: Weak<Mutex<AdapterShared>>,
    surface: Arc<dyn DisplaySurface>,
    generation: u64,
    handle: PlaybackHandle,
    autoplay: bool,
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        let mut guard = lock_unpoisoned(&shared);
        if !guard.is_current(generation) {
            return;
        }

        match event {
            EngineEvent::ManifestParsed => {
                let first = guard
                    .binding
                    .as_mut()
                    .map(|binding| !std::mem::replace(&mut binding.ready, true))
                    .unwrap_or(false);
                if !first {
                    continue;
                }
                if autoplay {
                    if let Err(e) = surface.play() {
                        debug!(handle = %handle.id(), "Autoplay not started: {}", e);
                    }
                }
                guard.deliver(&handle, PlaybackEvent::Ready);
            }
            EngineEvent::Buffering => guard.deliver(&handle, PlaybackEvent::Buffering),
            EngineEvent::Ended => {
                guard.deliver(&handle, PlaybackEvent::Ended);
                return;
            }
            EngineEvent::Fatal(failure) => {
                fail_binding(&mut guard, surface.as_ref(), &handle, failure);
                return;
            }
        }
    }

    // The engine went away without Ended or Fatal, e.g. its task panicked
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let mut guard = lock_unpoisoned(&shared);
    if guard.is_current(generation) {
        fail_binding(&mut guard, surface.as_ref(), &handle, PlaybackFailure::EngineStopped);
    }
}

fn fail_binding(
    shared: &mut AdapterShared,
    surface: &dyn DisplaySurface,
    handle: &PlaybackHandle,
    failure: PlaybackFailure,
) {
    warn!(handle = %handle.id(), "Fatal playback error: {}", failure);
    release_binding(shared, surface, "fatal");
    shared.deliver(handle, PlaybackEvent::Failed(failure));
}
