use std::time::Duration;

use clap::{Parser, ValueEnum};
use url::Url;

use crate::application::services::{BulkMode, OrchestratorConfig};
use crate::domain::value_objects::{
    BackoffPolicy, DeviceId, GridArity, PlaybackOptions, StreamRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BulkModeArg {
    /// One request per camera, issued concurrently
    Concurrent,
    /// One bulk request for all cameras
    Batched,
}

impl From<BulkModeArg> for BulkMode {
    fn from(arg: BulkModeArg) -> Self {
        match arg {
            BulkModeArg::Concurrent => BulkMode::Concurrent,
            BulkModeArg::Batched => BulkMode::Batched,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "videowall-client",
    version = "0.1.0",
    about = "Headless multi-camera video wall client for the VMS stream API"
)]
pub struct Config {
    /// Base URL of the video-management backend
    #[arg(long, env = "VMS_BASE_URL", default_value = "http://localhost:8000")]
    pub base_url: String,

    /// Bearer token sent with every backend request
    #[arg(long, env = "VMS_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Backend request timeout in seconds
    #[arg(long, env = "VMS_TIMEOUT", default_value = "10")]
    pub request_timeout: u64,

    /// Grid side length (n x n tiles)
    #[arg(long, env = "GRID_ARITY", default_value = "8")]
    pub grid_arity: u8,

    /// Show only this device
    #[arg(long, env = "DEVICE_FILTER")]
    pub device_filter: Option<u64>,

    /// Channel requested for every camera
    #[arg(long, env = "STREAM_CHANNEL", default_value = "1")]
    pub channel: u8,

    /// Sub-stream requested for every camera (0 = main, 1 = sub)
    #[arg(long, env = "STREAM_SUB_STREAM", default_value = "0")]
    pub sub_stream: u8,

    /// Requested stream lifetime in seconds
    #[arg(long, env = "STREAM_DURATION", default_value = "3600")]
    pub stream_duration: u64,

    /// Start every visible camera after mounting
    #[arg(long, env = "AUTO_START")]
    pub auto_start: bool,

    /// Stop every running stream on shutdown
    #[arg(long, env = "STOP_ON_EXIT")]
    pub stop_on_exit: bool,

    /// How bulk start/stop reach the backend
    #[arg(long, env = "BULK_MODE", value_enum, default_value = "concurrent")]
    pub bulk_mode: BulkModeArg,

    /// Seconds between reconciliations with the active-stream registry
    #[arg(long, env = "RECONCILE_INTERVAL", default_value = "30")]
    pub reconcile_interval: u64,

    /// Metrics server port
    #[arg(long, env = "METRICS_PORT", default_value = "9003")]
    pub metrics_port: u16,

    /// Disable the adaptive engine and rely on native HLS playback
    #[arg(long)]
    pub no_adaptive: bool,

    /// Surfaces report native HLS support
    #[arg(long)]
    pub native_hls: bool,

    /// Disable low-latency live edge tracking
    #[arg(long)]
    pub no_low_latency: bool,

    /// Wait for an explicit play instead of starting tiles on their own
    #[arg(long)]
    pub no_autoplay: bool,

    /// Play tiles with sound; surfaces may refuse to autoplay unmuted
    #[arg(long)]
    pub unmuted: bool,

    /// Back buffer kept behind the play head, in seconds
    #[arg(long, default_value = "90")]
    pub back_buffer: u64,

    /// Consecutive fragment failures tolerated before playback is fatal
    #[arg(long, default_value = "3")]
    pub retry_budget: u32,

    /// Initial fragment retry delay in milliseconds
    #[arg(long, default_value = "500")]
    pub retry_initial_delay_ms: u64,

    /// Maximum fragment retry delay in milliseconds
    #[arg(long, default_value = "8000")]
    pub retry_max_delay_ms: u64,

    /// Fragment retry backoff multiplier
    #[arg(long, default_value = "2.0")]
    pub retry_multiplier: f64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Minimum allowed port (ports below 1024 are privileged)
const MIN_USER_PORT: u16 = 1024;

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid base URL '{}': {}", self.base_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("Base URL must start with http:// or https://");
        }

        Self::validate_port(self.metrics_port, "metrics")?;

        if self.request_timeout == 0 {
            anyhow::bail!("Request timeout cannot be 0");
        }

        if self.reconcile_interval == 0 {
            anyhow::bail!("Reconcile interval cannot be 0");
        }

        if self.retry_budget == 0 {
            anyhow::bail!("Retry budget must allow at least one retry");
        }

        if self.retry_multiplier <= 1.0 {
            anyhow::bail!("Retry multiplier must be > 1.0");
        }

        if self.retry_initial_delay_ms == 0 {
            anyhow::bail!("Initial retry delay cannot be 0");
        }

        if self.retry_max_delay_ms < self.retry_initial_delay_ms {
            anyhow::bail!(
                "Maximum retry delay ({}ms) cannot be less than initial delay ({}ms)",
                self.retry_max_delay_ms,
                self.retry_initial_delay_ms
            );
        }

        GridArity::new(self.grid_arity)?;
        self.to_stream_template()?;

        Ok(())
    }

    fn validate_port(port: u16, name: &str) -> anyhow::Result<()> {
        if port == 0 {
            anyhow::bail!("Invalid {} port: port cannot be 0", name);
        }
        if port < MIN_USER_PORT {
            anyhow::bail!(
                "Invalid {} port: {} is a privileged port (< {}). Use a port >= {}",
                name,
                port,
                MIN_USER_PORT,
                MIN_USER_PORT
            );
        }
        Ok(())
    }

    pub fn base_url(&self) -> anyhow::Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval)
    }

    pub fn to_backoff_policy(&self) -> crate::domain::errors::Result<BackoffPolicy> {
        BackoffPolicy::new(
            Duration::from_millis(self.retry_initial_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
            self.retry_multiplier,
        )
    }

    pub fn to_playback_options(&self) -> crate::domain::errors::Result<PlaybackOptions> {
        Ok(PlaybackOptions::new()
            .with_autoplay(!self.no_autoplay)
            .with_muted(!self.unmuted)
            .with_low_latency(!self.no_low_latency)
            .with_back_buffer(Duration::from_secs(self.back_buffer))
            .with_retry_budget(self.retry_budget)
            .with_backoff(self.to_backoff_policy()?))
    }

    /// Stream parameters shared by every tile
    pub fn to_stream_template(&self) -> crate::domain::errors::Result<StreamRequest> {
        StreamRequest::new(DeviceId(0))
            .with_channel(self.channel)?
            .with_sub_stream(self.sub_stream)?
            .with_duration_hint(Duration::from_secs(self.stream_duration))
    }

    pub fn to_orchestrator_config(&self) -> crate::domain::errors::Result<OrchestratorConfig> {
        Ok(OrchestratorConfig {
            arity: GridArity::new(self.grid_arity)?,
            device_filter: self.device_filter.map(DeviceId),
            bulk_mode: self.bulk_mode.into(),
            request_template: self.to_stream_template()?,
            playback: self.to_playback_options()?,
        })
    }
}
