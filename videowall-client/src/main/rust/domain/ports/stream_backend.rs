use async_trait::async_trait;

use crate::domain::entities::{ActiveStream, Device, StreamSession};
use crate::domain::errors::Result;
use crate::domain::value_objects::{DeviceId, StreamRequest};

/// Per-item result of a bulk start
#[derive(Debug, Clone)]
pub struct BulkStartItem {
    pub device_id: DeviceId,
    pub outcome: std::result::Result<StreamSession, String>,
}

/// Per-item result of a bulk stop
#[derive(Debug, Clone)]
pub struct BulkStopItem {
    pub session_id: String,
    pub outcome: std::result::Result<(), String>,
}

/// Port for the video-management backend's stream API
#[async_trait]
pub trait StreamBackend: Send + Sync {
    /// Start a stream and return the session the backend created for it
    async fn start_stream(&self, request: &StreamRequest) -> Result<StreamSession>;

    /// Stop a session. A session the backend no longer knows counts as stopped.
    async fn stop_stream(&self, session_id: &str) -> Result<()>;

    /// Start several streams in one call. `Err` only when the call itself failed.
    async fn bulk_start(&self, requests: &[StreamRequest]) -> Result<Vec<BulkStartItem>>;

    async fn bulk_stop(&self, session_ids: &[String]) -> Result<Vec<BulkStopItem>>;

    /// Authoritative registry of running sessions
    async fn active_streams(&self) -> Result<Vec<ActiveStream>>;

    async fn devices(&self) -> Result<Vec<Device>>;
}
