use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use uuid::Uuid;

use crate::domain::errors::Result;
use crate::domain::value_objects::{ContainerFormat, DeviceId, PlaybackLocator};

/// MIME type probed for native HLS support
pub const HLS_MIME_TYPE: &str = "application/vnd.apple.mpegurl";

/// One media segment handed from an engine to a surface
#[derive(Debug, Clone)]
pub struct MediaSegment {
    pub sequence: u64,
    pub duration: Duration,
    pub format: ContainerFormat,
    pub data: Bytes,
}

/// Port for the element video is rendered into
pub trait DisplaySurface: Send + Sync {
    fn id(&self) -> Uuid;

    fn can_play_natively(&self, mime_type: &str) -> bool;

    /// Claim the surface for `handle`. Fails with `SurfaceBusy` while another handle holds it.
    fn attach(&self, handle: Uuid) -> Result<()>;

    /// Release the claim; ignored when `handle` is not the holder
    fn detach(&self, handle: Uuid);

    /// Point native playback at a manifest, or clear the source
    fn set_source(&self, locator: Option<&PlaybackLocator>);

    fn set_muted(&self, muted: bool);

    /// Begin playback; `AutoplayRejected` when the permission policy refuses
    fn play(&self) -> Result<()>;

    fn append_segment(&self, segment: MediaSegment);

    /// Drop buffered media older than `back_buffer` behind the play head
    fn trim_back_buffer(&self, back_buffer: Duration);
}

/// Hands out a surface for each tile the grid renders
pub trait SurfaceProvider: Send + Sync {
    fn surface_for(&self, device_id: DeviceId) -> Arc<dyn DisplaySurface>;
}
