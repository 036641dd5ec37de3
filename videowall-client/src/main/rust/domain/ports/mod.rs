mod display_surface;
mod metrics_reporter;
mod playback_engine;
mod stream_backend;
mod stream_observer;

pub use display_surface::{DisplaySurface, MediaSegment, SurfaceProvider, HLS_MIME_TYPE};
pub use metrics_reporter::MetricsReporter;
pub use playback_engine::{AdaptiveEngine, EngineEvent, EngineEventSender, EngineFactory, PlaybackListener};
pub use stream_backend::{BulkStartItem, BulkStopItem, StreamBackend};
pub use stream_observer::{NoopObserver, StreamObserver};
