use thiserror::Error;

/// Terminal playback errors; recoverable ones never leave the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackFailure {
    #[error("manifest could not be loaded or parsed: {0}")]
    ManifestInvalid(String),

    #[error("unsupported segment container: {0}")]
    UnsupportedContainer(String),

    #[error("fragment retry budget exhausted after {attempts} consecutive failures")]
    RetriesExhausted { attempts: u32 },

    #[error("neither adaptive streaming nor native HLS playback is available")]
    UnsupportedEnvironment,

    #[error("playback engine stopped without reporting an outcome")]
    EngineStopped,
}
