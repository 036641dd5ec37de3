use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::playlist::{self, MediaPlaylist, Playlist, SegmentRef};
use crate::domain::ports::{
    AdaptiveEngine, DisplaySurface, EngineEvent, EngineEventSender, EngineFactory, MediaSegment,
};
use crate::domain::value_objects::{ContainerFormat, PlaybackFailure, PlaybackLocator, PlaybackOptions};

const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Creates HLS engines sharing one HTTP connection pool
pub struct HlsEngineFactory {
    http: reqwest::Client,
    enabled: bool,
}

impl HlsEngineFactory {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http, enabled: true }
    }

    /// Factory reporting no adaptive support, forcing native playback
    pub fn disabled(http: reqwest::Client) -> Self {
        Self { http, enabled: false }
    }
}

impl EngineFactory for HlsEngineFactory {
    fn is_supported(&self) -> bool {
        self.enabled
    }

    fn create(&self, options: &PlaybackOptions) -> Box<dyn AdaptiveEngine> {
        Box::new(HlsEngine::new(self.http.clone(), options.clone()))
    }
}

/// Live HLS pipeline: polls the media playlist and feeds new segments to the surface
pub struct HlsEngine {
    http: reqwest::Client,
    options: PlaybackOptions,
    task: Option<JoinHandle<()>>,
}

impl HlsEngine {
    pub fn new(http: reqwest::Client, options: PlaybackOptions) -> Self {
        Self {
            http,
            options,
            task: None,
        }
    }
}

impl AdaptiveEngine for HlsEngine {
    fn load(
        &mut self,
        locator: &PlaybackLocator,
        surface: Arc<dyn DisplaySurface>,
        events: EngineEventSender,
    ) {
        self.destroy();
        let session = EngineSession {
            http: self.http.clone(),
            options: self.options.clone(),
            surface,
            events,
            failures: 0,
        };
        self.task = Some(tokio::spawn(session.run(locator.url().clone())));
    }

    fn destroy(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for HlsEngine {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Why one fetch failed
enum FetchError {
    /// Worth retrying
    Transient(String),
    Fatal(PlaybackFailure),
}

struct EngineSession {
    http: reqwest::Client,
    options: PlaybackOptions,
    surface: Arc<dyn DisplaySurface>,
    events: EngineEventSender,
    failures: u32,
}

impl EngineSession {
    async fn run(mut self, manifest_url: Url) {
        if let Err(failure) = self.play(manifest_url).await {
            warn!("HLS playback failed: {}", failure);
            let _ = self.events.send(EngineEvent::Fatal(failure));
        }
    }

    async fn play(&mut self, manifest_url: Url) -> Result<(), PlaybackFailure> {
        let (media_url, mut media) = self.load_media_playlist(manifest_url).await?;
        if !self.emit(EngineEvent::ManifestParsed) {
            return Ok(());
        }

        let start_index = if media.ended {
            0
        } else {
            media
                .segments
                .len()
                .saturating_sub(self.options.live_edge_segments())
        };
        // Lowest sequence eligible for playback, and the highest one appended so far
        let mut floor = media
            .segments
            .get(start_index)
            .map_or(media.media_sequence, |s| s.sequence);
        let mut played: Option<u64> = None;
        // A failing segment keeps its retry count across playlist refreshes
        let mut segment_stalled = false;
        info!(playlist = %media_url, sequence = floor, "HLS playback started");

        loop {
            let pending: Vec<SegmentRef> = media
                .segments
                .iter()
                .filter(|s| s.sequence >= floor && played.map_or(true, |p| s.sequence > p))
                .cloned()
                .collect();

            for segment in &pending {
                let url = media_url
                    .join(&segment.uri)
                    .map_err(|e| PlaybackFailure::ManifestInvalid(format!("{}: {e}", segment.uri)))?;
                let format = ContainerFormat::from_path(url.path())
                    .ok_or_else(|| PlaybackFailure::UnsupportedContainer(segment.uri.clone()))?;

                match self.fetch(&url).await {
                    Ok(data) => {
                        self.surface.append_segment(MediaSegment {
                            sequence: segment.sequence,
                            duration: segment.duration,
                            format,
                            data,
                        });
                        self.surface.trim_back_buffer(self.options.back_buffer());
                        played = Some(segment.sequence);
                        segment_stalled = false;
                        self.recovered();
                    }
                    Err(FetchError::Fatal(failure)) => return Err(failure),
                    Err(FetchError::Transient(reason)) => {
                        segment_stalled = true;
                        if !self.recover(&reason).await? {
                            return Ok(());
                        }
                        break;
                    }
                }
            }

            let caught_up = media
                .last_sequence()
                .map_or(true, |last| played.is_some_and(|p| p >= last));
            if media.ended && caught_up {
                info!(playlist = %media_url, "HLS stream ended");
                self.emit(EngineEvent::Ended);
                return Ok(());
            }

            tokio::time::sleep(self.refresh_interval(&media)).await;

            match self.fetch_media(&media_url).await {
                Ok(refreshed) => {
                    if !segment_stalled {
                        self.recovered();
                    }
                    let expected = played.map_or(floor, |p| p.saturating_add(1));
                    if refreshed.media_sequence > expected {
                        debug!(
                            from = expected,
                            to = refreshed.media_sequence,
                            "Fell behind the live window, skipping ahead"
                        );
                    }
                    floor = floor.max(refreshed.media_sequence);
                    media = refreshed;
                }
                Err(FetchError::Transient(reason)) | Err(FetchError::Fatal(PlaybackFailure::ManifestInvalid(reason))) => {
                    if !self.recover(&format!("playlist refresh: {reason}")).await? {
                        return Ok(());
                    }
                }
                Err(FetchError::Fatal(failure)) => return Err(failure),
            }
        }
    }

    /// Resolve the manifest to a media playlist, following the first variant
    /// of a master playlist. Parse failures here are fatal.
    async fn load_media_playlist(&mut self, manifest_url: Url) -> Result<(Url, MediaPlaylist), PlaybackFailure> {
        let mut url = manifest_url;
        loop {
            let text = match self.fetch_text(&url).await {
                Ok(text) => text,
                Err(FetchError::Fatal(failure)) => return Err(failure),
                Err(FetchError::Transient(reason)) => {
                    if !self.recover(&format!("manifest: {reason}")).await? {
                        return Err(PlaybackFailure::ManifestInvalid("engine detached".to_string()));
                    }
                    continue;
                }
            };

            match playlist::parse(&text)? {
                Playlist::Media(media) => {
                    self.recovered();
                    return Ok((url, media));
                }
                Playlist::Master(variants) => {
                    let variant = variants
                        .first()
                        .ok_or_else(|| PlaybackFailure::ManifestInvalid("master playlist without variants".to_string()))?;
                    debug!(variant = %variant.uri, bandwidth = ?variant.bandwidth, "Selected variant");
                    url = url
                        .join(&variant.uri)
                        .map_err(|e| PlaybackFailure::ManifestInvalid(format!("{}: {e}", variant.uri)))?;
                }
            }
        }
    }

    async fn fetch_media(&self, url: &Url) -> Result<MediaPlaylist, FetchError> {
        let text = self.fetch_text(url).await?;
        match playlist::parse(&text).map_err(FetchError::Fatal)? {
            Playlist::Media(media) => Ok(media),
            Playlist::Master(_) => Err(FetchError::Fatal(PlaybackFailure::ManifestInvalid(
                "media playlist turned into a master playlist".to_string(),
            ))),
        }
    }

    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let bytes = self.fetch(url).await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| FetchError::Fatal(PlaybackFailure::ManifestInvalid(format!("{url} is not UTF-8"))))
    }

    async fn fetch(&self, url: &Url) -> Result<Bytes, FetchError> {
        let resp = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        resp.bytes()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))
    }

    /// Count a recoverable failure, report buffering and wait out the backoff.
    /// Fails once the retry budget is exhausted; `Ok(false)` when nobody listens anymore.
    async fn recover(&mut self, reason: &str) -> Result<bool, PlaybackFailure> {
        self.failures += 1;
        if self.failures > self.options.retry_budget() {
            return Err(PlaybackFailure::RetriesExhausted {
                attempts: self.failures,
            });
        }

        let delay = self.options.backoff().delay_for_attempt(self.failures);
        debug!(attempt = self.failures, ?delay, "Retrying after {}", reason);
        if !self.emit(EngineEvent::Buffering) {
            return Ok(false);
        }
        tokio::time::sleep(delay).await;
        Ok(true)
    }

    fn recovered(&mut self) {
        self.failures = 0;
    }

    fn refresh_interval(&self, media: &MediaPlaylist) -> Duration {
        let interval = if self.options.low_latency() {
            media.target_duration / 2
        } else {
            media.target_duration
        };
        interval.max(MIN_REFRESH_INTERVAL)
    }

    fn emit(&self, event: EngineEvent) -> bool {
        self.events.send(event).is_ok()
    }
}
