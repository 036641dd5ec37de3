mod controller_lifecycle;
mod device;
mod stream_session;

pub use controller_lifecycle::{ControllerLifecycle, StateTransition};
pub use device::Device;
pub use stream_session::{ActiveStream, StreamSession};
