use std::fmt;

/// Per-tile stream session states (pure domain)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerState {
    /// No session and no request outstanding
    Idle,
    /// Start request sent, waiting for the backend
    Requesting,
    /// Backend session established
    Live,
    /// Stop request sent, waiting for the backend
    Stopping,
    /// Last control or playback action failed
    Error,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Requesting => write!(f, "REQUESTING"),
            Self::Live => write!(f, "LIVE"),
            Self::Stopping => write!(f, "STOPPING"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl ControllerState {
    /// States that own a pending request or a backend session
    pub fn holds_session(&self) -> bool {
        matches!(self, Self::Requesting | Self::Live | Self::Stopping)
    }

    /// States from which a start may be issued
    pub fn is_startable(&self) -> bool {
        matches!(self, Self::Idle | Self::Error)
    }

    /// States a bulk stop acts on
    pub fn is_stoppable(&self) -> bool {
        matches!(self, Self::Live | Self::Requesting)
    }

    /// Edges of the tile state machine.
    ///
    /// `Idle -> Live` and `Live -> Idle` are only taken by reconciliation
    /// against the backend's active-stream registry.
    pub fn can_transition_to(&self, next: ControllerState) -> bool {
        use ControllerState::{Error, Idle, Live, Requesting, Stopping};

        matches!(
            (self, next),
            (Idle, Requesting)
                | (Requesting, Live)
                | (Requesting, Error)
                | (Live, Stopping)
                | (Live, Error)
                | (Stopping, Idle)
                | (Stopping, Error)
                | (Error, Idle)
                | (Idle, Live)
                | (Live, Idle)
        )
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::Idle
    }
}
