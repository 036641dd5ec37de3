use std::sync::Arc;

use tokio::sync::mpsc;

use super::DisplaySurface;
use crate::domain::value_objects::{PlaybackEvent, PlaybackFailure, PlaybackHandle, PlaybackLocator, PlaybackOptions};

/// Raw engine notifications, before the adapter filters them by binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ManifestParsed,
    /// A recoverable fetch failure is being retried
    Buffering,
    Ended,
    Fatal(PlaybackFailure),
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// One adaptive-streaming pipeline instance
pub trait AdaptiveEngine: Send {
    /// Start loading `locator` into `surface`. Events go to `events` until `destroy`.
    fn load(
        &mut self,
        locator: &PlaybackLocator,
        surface: Arc<dyn DisplaySurface>,
        events: EngineEventSender,
    );

    /// Stop all fetching. Must be idempotent.
    fn destroy(&mut self);
}

pub trait EngineFactory: Send + Sync {
    /// Whether adaptive streaming works in this environment at all
    fn is_supported(&self) -> bool;

    fn create(&self, options: &PlaybackOptions) -> Box<dyn AdaptiveEngine>;
}

/// Receives adapter events for the binding identified by `handle`.
///
/// Called with the adapter's binding lock held: implementations must not
/// call back into the adapter synchronously.
pub trait PlaybackListener: Send + Sync {
    fn on_playback_event(&self, handle: &PlaybackHandle, event: PlaybackEvent);
}
