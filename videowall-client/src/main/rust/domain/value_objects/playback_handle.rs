use uuid::Uuid;

use super::{PlaybackFailure, PlaybackLocator};

/// How a bound locator reaches the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    /// Segments fetched and appended by an adaptive-streaming engine
    Adaptive,
    /// Surface plays the manifest itself
    Native,
}

/// Opaque reference to one engine instance bound to one surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackHandle {
    id: Uuid,
    surface_id: Uuid,
    locator: PlaybackLocator,
    mode: PlaybackMode,
}

impl PlaybackHandle {
    pub fn new(surface_id: Uuid, locator: PlaybackLocator, mode: PlaybackMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            surface_id,
            locator,
            mode,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn surface_id(&self) -> Uuid {
        self.surface_id
    }

    pub fn locator(&self) -> &PlaybackLocator {
        &self.locator
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }
}

/// Events an adapter reports for its current binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Ready,
    Buffering,
    Ended,
    Failed(PlaybackFailure),
}
