use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::value_objects::{DeviceId, PlaybackLocator, StreamRequest};

/// Backend stream session owned by one controller
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSession {
    id: String,
    device_id: DeviceId,
    channel: Option<u8>,
    sub_stream: Option<u8>,
    device_name: Option<String>,
    locator: PlaybackLocator,
    started_at: DateTime<Utc>,
    duration: Duration,
}

impl StreamSession {
    /// Session created by a successful start call
    pub fn started(
        id: impl Into<String>,
        request: &StreamRequest,
        locator: PlaybackLocator,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            device_id: request.device_id(),
            channel: Some(request.channel()),
            sub_stream: Some(request.sub_stream()),
            device_name: None,
            locator,
            started_at,
            duration: request.duration_hint(),
        }
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Unknown for sessions adopted from a registry entry that omits it
    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn sub_stream(&self) -> Option<u8> {
        self.sub_stream
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn locator(&self) -> &PlaybackLocator {
        &self.locator
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        let duration = chrono::Duration::from_std(self.duration).unwrap_or(chrono::Duration::zero());
        self.started_at + duration
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

/// Entry of the backend's active-stream registry
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveStream {
    pub session_id: String,
    pub locator: PlaybackLocator,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub device_id: Option<DeviceId>,
    pub channel: Option<u8>,
    pub sub_stream: Option<u8>,
}

impl ActiveStream {
    /// Whether this entry can stand in for `request` on its device.
    /// Channel and sub-stream only constrain the match when both sides know them.
    pub fn matches(&self, request: &StreamRequest) -> bool {
        if self.device_id != Some(request.device_id()) {
            return false;
        }
        let channel_ok = self.channel.map_or(true, |c| c == request.channel());
        let sub_stream_ok = self.sub_stream.map_or(true, |s| s == request.sub_stream());
        channel_ok && sub_stream_ok
    }

    /// Adopt the entry as a controller-owned session. `None` when the entry
    /// carries no device identity.
    pub fn to_session(&self) -> Option<StreamSession> {
        let device_id = self.device_id?;
        Some(StreamSession {
            id: self.session_id.clone(),
            device_id,
            channel: self.channel,
            sub_stream: self.sub_stream,
            device_name: None,
            locator: self.locator.clone(),
            started_at: self.started_at,
            duration: self.duration,
        })
    }
}
