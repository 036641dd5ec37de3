use crate::domain::entities::StreamSession;

/// Observational hooks for stream lifecycle; never influence control flow
pub trait StreamObserver: Send + Sync {
    fn on_stream_start(&self, _session: &StreamSession) {}

    fn on_stream_stop(&self, _session_id: &str) {}
}

pub struct NoopObserver;

impl StreamObserver for NoopObserver {}
