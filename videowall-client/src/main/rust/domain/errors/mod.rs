use thiserror::Error;

use crate::domain::value_objects::{ControllerState, DeviceId, PlaybackFailure};

#[derive(Debug, Clone, Error)]
pub enum DomainError {
    #[error("Invalid channel {0}: must be between 1 and 64")]
    InvalidChannel(u8),

    #[error("Invalid sub-stream {0}: must be 0 (main) or 1 (sub)")]
    InvalidSubStream(u8),

    #[error("Invalid duration hint {0}s: must be between 60 and 86400 seconds")]
    InvalidDuration(u64),

    #[error("Invalid grid arity {0}: must be between 1 and 10")]
    InvalidGridArity(u8),

    #[error("Invalid playback locator: {0}")]
    InvalidLocator(String),

    #[error("Invalid backoff multiplier: must be > 1.0")]
    InvalidBackoffMultiplier,

    #[error("Invalid backoff bounds: initial {initial:?} must be non-zero and at most {ceiling:?}")]
    InvalidBackoffBounds {
        initial: std::time::Duration,
        ceiling: std::time::Duration,
    },

    #[error("Request for device {requested} sent to controller of device {owner}")]
    DeviceMismatch { owner: DeviceId, requested: DeviceId },

    #[error("Backend rejected request (HTTP {status}): {reason}")]
    Backend { status: u16, reason: String },

    #[error("Backend rejected stream: {0}")]
    Rejected(String),

    #[error("Backend unreachable: {0}")]
    Transport(String),

    #[error("Unexpected backend response: {0}")]
    Decode(String),

    #[error("Playback failed: {0}")]
    Playback(#[from] PlaybackFailure),

    #[error("Display surface already bound to another playback handle")]
    SurfaceBusy,

    #[error("Autoplay rejected by the surface's permission policy")]
    AutoplayRejected,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        from: ControllerState,
        to: ControllerState,
    },

    #[error("Controller for device {0} has been retired")]
    ControllerRetired(DeviceId),
}

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
