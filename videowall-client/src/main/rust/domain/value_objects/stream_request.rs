use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, Result};

/// Backend identifier of a recorder or camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub u64);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DeviceId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

const MAX_CHANNEL: u8 = 64;
const MAX_SUB_STREAM: u8 = 1;
const MIN_DURATION_SECS: u64 = 60;
const MAX_DURATION_SECS: u64 = 86_400;
const DEFAULT_DURATION_SECS: u64 = 3_600;

/// Parameters of a remote stream start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    device_id: DeviceId,
    channel: u8,
    sub_stream: u8,
    duration_hint: Duration,
}

impl StreamRequest {
    /// Main stream of channel 1 for one hour
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            channel: 1,
            sub_stream: 0,
            duration_hint: Duration::from_secs(DEFAULT_DURATION_SECS),
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Result<Self> {
        if channel == 0 || channel > MAX_CHANNEL {
            return Err(DomainError::InvalidChannel(channel));
        }
        self.channel = channel;
        Ok(self)
    }

    pub fn with_sub_stream(mut self, sub_stream: u8) -> Result<Self> {
        if sub_stream > MAX_SUB_STREAM {
            return Err(DomainError::InvalidSubStream(sub_stream));
        }
        self.sub_stream = sub_stream;
        Ok(self)
    }

    pub fn with_duration_hint(mut self, duration: Duration) -> Result<Self> {
        let secs = duration.as_secs();
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&secs) {
            return Err(DomainError::InvalidDuration(secs));
        }
        self.duration_hint = Duration::from_secs(secs);
        Ok(self)
    }

    /// Same stream parameters for another device
    pub fn for_device(mut self, device_id: DeviceId) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn sub_stream(&self) -> u8 {
        self.sub_stream
    }

    pub fn duration_hint(&self) -> Duration {
        self.duration_hint
    }
}
