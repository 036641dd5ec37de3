use serde::{Deserialize, Serialize};

use crate::domain::value_objects::DeviceId;

fn default_port() -> u16 {
    80
}

fn default_channels() -> u8 {
    16
}

fn default_active() -> bool {
    true
}

/// Recorder or camera registered on the backend. Read-only to the wall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    id: DeviceId,
    name: String,
    #[serde(default)]
    brand: String,
    #[serde(default)]
    ip: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_channels")]
    channels: u8,
    #[serde(default = "default_active")]
    is_active: bool,
}

impl Device {
    pub fn new(id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            brand: String::new(),
            ip: String::new(),
            port: default_port(),
            channels: default_channels(),
            is_active: true,
        }
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn has_channel(&self, channel: u8) -> bool {
        channel >= 1 && channel <= self.channels
    }
}
