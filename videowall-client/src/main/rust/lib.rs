pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-exports for convenience
pub use application::services::{
    ActiveSessionReconciler, BulkMode, GridOrchestrator, OrchestratorConfig, PlaybackAdapter,
    SessionController, TileSnapshot, WallSummary,
};
pub use config::Config;
pub use domain::entities::{ActiveStream, ControllerLifecycle, Device, StateTransition, StreamSession};
pub use domain::errors::{DomainError, Result};
pub use domain::ports::{
    DisplaySurface, EngineFactory, MetricsReporter, StreamBackend, StreamObserver, SurfaceProvider,
};
pub use domain::value_objects::{
    BackoffPolicy, BulkOperationResult, ControllerState, DeviceId, GridArity, PlaybackFailure,
    PlaybackLocator, PlaybackOptions, ReconcileReport, StreamRequest,
};
pub use infrastructure::hls::{HlsEngine, HlsEngineFactory};
pub use infrastructure::http::HttpStreamBackend;
pub use infrastructure::metrics::{serve_metrics, PrometheusReporter};
pub use infrastructure::surface::{HeadlessSurface, HeadlessSurfaceProvider};
