use std::time::Duration;

use super::BackoffPolicy;

/// Playback engine tuning shared by every tile
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    autoplay: bool,
    muted: bool,
    low_latency: bool,
    back_buffer: Duration,
    retry_budget: u32,
    live_edge_segments: usize,
    backoff: BackoffPolicy,
}

impl PlaybackOptions {
    pub fn new() -> Self {
        Self {
            autoplay: true,
            muted: true,
            low_latency: true,
            back_buffer: Duration::from_secs(90),
            retry_budget: 3,
            live_edge_segments: 3,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_autoplay(mut self, enabled: bool) -> Self {
        self.autoplay = enabled;
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn with_low_latency(mut self, enabled: bool) -> Self {
        self.low_latency = enabled;
        self
    }

    pub fn with_back_buffer(mut self, back_buffer: Duration) -> Self {
        self.back_buffer = back_buffer;
        self
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn low_latency(&self) -> bool {
        self.low_latency
    }

    pub fn back_buffer(&self) -> Duration {
        self.back_buffer
    }

    /// Consecutive fragment failures tolerated before playback is fatal
    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// How many segments behind the live edge playback begins.
    /// Low-latency mode always starts at the newest segment.
    pub fn live_edge_segments(&self) -> usize {
        if self.low_latency {
            1
        } else {
            self.live_edge_segments
        }
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self::new()
    }
}
