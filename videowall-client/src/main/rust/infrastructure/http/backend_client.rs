use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::wire::{
    error_reason, parse_started_at, ActiveStreamsResponse, BulkStartResponse, BulkStopResponse,
    StartStreamBody, StartStreamResponse, StopStreamBody, STATUS_SUCCESS,
};
use crate::domain::entities::{ActiveStream, Device, StreamSession};
use crate::domain::errors::{DomainError, Result};
use crate::domain::ports::{BulkStartItem, BulkStopItem, StreamBackend};
use crate::domain::value_objects::{DeviceId, PlaybackLocator, StreamRequest};

const START_PATH: &str = "api/streams/start";
const STOP_PATH: &str = "api/streams/stop";
const BULK_START_PATH: &str = "api/streams/bulk/start";
const BULK_STOP_PATH: &str = "api/streams/bulk/stop";
const ACTIVE_PATH: &str = "api/streams/active";
const DEVICES_PATH: &str = "api/devices";

/// JSON-over-HTTP client for the video-management backend
pub struct HttpStreamBackend {
    http: reqwest::Client,
    base_url: Url,
}

impl HttpStreamBackend {
    /// Build a client for `base_url`, sending `token` as a bearer credential
    pub fn new(base_url: Url, token: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| DomainError::Transport(format!("invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Wrap an existing client; the caller manages auth headers
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DomainError::Transport(format!("invalid endpoint {path}: {e}")))
    }

    fn locator(&self, playlist_url: &str) -> Result<PlaybackLocator> {
        PlaybackLocator::resolve(&self.base_url, playlist_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        Self::decode(Self::check(resp).await?).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized + Sync>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        Self::decode(Self::check(resp).await?).await
    }

    /// Map non-2xx responses to `Backend` errors carrying the body's `detail`
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let reason = match error_reason(&body) {
            reason if reason.is_empty() => status.canonical_reason().unwrap_or("error").to_string(),
            reason => reason,
        };
        Err(DomainError::Backend {
            status: status.as_u16(),
            reason,
        })
    }

    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| DomainError::Decode(e.to_string()))
    }
}

#[async_trait]
impl StreamBackend for HttpStreamBackend {
    async fn start_stream(&self, request: &StreamRequest) -> Result<StreamSession> {
        let body = StartStreamBody::from(request);
        let response: StartStreamResponse = self.post(START_PATH, &body).await?;

        let locator = self.locator(&response.playlist_url)?;
        let session = StreamSession::started(response.stream_id, request, locator, Utc::now());
        Ok(match response.device_name {
            Some(name) => session.with_device_name(name),
            None => session,
        })
    }

    async fn stop_stream(&self, session_id: &str) -> Result<()> {
        let url = self.url(STOP_PATH)?;
        debug!("POST {url}");

        let resp = self
            .http
            .post(url)
            .json(&StopStreamBody { stream_id: session_id })
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(session_id, "Stop of unknown session treated as stopped");
            return Ok(());
        }
        Self::check(resp).await.map(|_| ())
    }

    async fn bulk_start(&self, requests: &[StreamRequest]) -> Result<Vec<BulkStartItem>> {
        let body: Vec<StartStreamBody> = requests.iter().map(StartStreamBody::from).collect();
        let response: BulkStartResponse = self.post(BULK_START_PATH, &body).await?;

        let started_at = Utc::now();
        let items = response
            .results
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let request = match entry.device_id {
                    Some(id) => requests.iter().find(|r| r.device_id() == DeviceId(id)),
                    None => requests.get(index),
                }?;

                let outcome = if entry.status == STATUS_SUCCESS {
                    match (entry.stream_id, entry.playlist_url) {
                        (Some(stream_id), Some(playlist_url)) => self
                            .locator(&playlist_url)
                            .map(|locator| StreamSession::started(stream_id, request, locator, started_at))
                            .map_err(|e| e.to_string()),
                        _ => Err("success without stream id or playlist".to_string()),
                    }
                } else {
                    Err(entry.message.unwrap_or_else(|| entry.status.clone()))
                };

                Some(BulkStartItem {
                    device_id: request.device_id(),
                    outcome,
                })
            })
            .collect();
        Ok(items)
    }

    async fn bulk_stop(&self, session_ids: &[String]) -> Result<Vec<BulkStopItem>> {
        let response: BulkStopResponse = self.post(BULK_STOP_PATH, session_ids).await?;

        Ok(response
            .results
            .into_iter()
            .map(|entry| BulkStopItem {
                outcome: if entry.status == STATUS_SUCCESS {
                    Ok(())
                } else {
                    Err(entry.message.unwrap_or_else(|| entry.status.clone()))
                },
                session_id: entry.stream_id,
            })
            .collect())
    }

    async fn active_streams(&self) -> Result<Vec<ActiveStream>> {
        let response: ActiveStreamsResponse = self.get(ACTIVE_PATH).await?;

        let mut streams = Vec::with_capacity(response.streams.len());
        for (session_id, entry) in response.streams {
            let locator = match self.locator(&entry.playlist_url) {
                Ok(locator) => locator,
                Err(e) => {
                    warn!(session_id = %session_id, "Skipping registry entry: {}", e);
                    continue;
                }
            };
            streams.push(ActiveStream {
                session_id,
                locator,
                started_at: entry
                    .started_at
                    .as_deref()
                    .and_then(parse_started_at)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
                duration: Duration::from_secs(entry.duration.unwrap_or(0)),
                device_id: entry.device_id.map(DeviceId),
                channel: entry.channel,
                sub_stream: entry.sub_stream,
            });
        }
        Ok(streams)
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        self.get(DEVICES_PATH).await
    }
}
