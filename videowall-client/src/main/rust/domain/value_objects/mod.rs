mod backoff_policy;
mod bulk_result;
mod container_format;
mod controller_state;
mod grid_arity;
mod playback_failure;
mod playback_handle;
mod playback_locator;
mod playback_options;
mod reconcile_report;
mod stream_request;

pub use backoff_policy::BackoffPolicy;
pub use bulk_result::{BulkFailure, BulkOperationResult};
pub use container_format::ContainerFormat;
pub use controller_state::ControllerState;
pub use grid_arity::GridArity;
pub use playback_failure::PlaybackFailure;
pub use playback_handle::{PlaybackEvent, PlaybackHandle, PlaybackMode};
pub use playback_locator::PlaybackLocator;
pub use playback_options::PlaybackOptions;
pub use reconcile_report::ReconcileReport;
pub use stream_request::{DeviceId, StreamRequest};
