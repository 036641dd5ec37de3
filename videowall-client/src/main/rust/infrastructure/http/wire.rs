use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::StreamRequest;

pub(super) const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Serialize)]
pub(super) struct StartStreamBody {
    device_id: u64,
    channel: u8,
    sub_stream: u8,
    duration: u64,
}

impl From<&StreamRequest> for StartStreamBody {
    fn from(request: &StreamRequest) -> Self {
        Self {
            device_id: request.device_id().0,
            channel: request.channel(),
            sub_stream: request.sub_stream(),
            duration: request.duration_hint().as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct StartStreamResponse {
    pub stream_id: String,
    pub playlist_url: String,
    #[serde(default)]
    pub device_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct StopStreamBody<'a> {
    pub stream_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkStartResponse {
    #[serde(default)]
    pub results: Vec<BulkStartEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkStartEntry {
    #[serde(default)]
    pub device_id: Option<u64>,
    pub status: String,
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub playlist_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkStopResponse {
    #[serde(default)]
    pub results: Vec<BulkStopEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BulkStopEntry {
    pub stream_id: String,
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ActiveStreamsResponse {
    #[serde(default)]
    pub streams: HashMap<String, ActiveStreamEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ActiveStreamEntry {
    pub playlist_url: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub device_id: Option<u64>,
    #[serde(default)]
    pub channel: Option<u8>,
    #[serde(default)]
    pub sub_stream: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ValidationIssue {
    msg: String,
}

/// Human-readable reason from an error body. Falls back to the raw text.
pub(super) fn error_reason(body: &str) -> String {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return body.trim().to_string();
    };
    match parsed.detail {
        serde_json::Value::String(detail) => detail,
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<ValidationIssue>(item).ok())
            .map(|issue| issue.msg)
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// Registry timestamps are either RFC 3339 or naive UTC
pub(super) fn parse_started_at(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
