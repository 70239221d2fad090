//! Configuration types for segment-dl
//!
//! A [`Config`] is built once per session and handed to each component as an
//! `Arc<Config>`. Nothing reads configuration from process-wide state.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Remote backend settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the segmenting backend (default: "http://127.0.0.1:8000")
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Timeout applied to every HTTP request (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// What the coordinator does with segments that already exhausted their retries
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedSegmentPolicy {
    /// Failed segments stay failed for the rest of the session (default)
    #[default]
    GiveUp,
    /// Failed segments go back to pending when the backend lists them as ready again
    RetryNextCycle,
}

/// Download behavior configuration (directories, concurrency, monitoring limits)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root download directory; each asset gets its own subdirectory (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum segments fetched in parallel (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_segments: usize,

    /// Sleep between monitor cycles (default: 2000 ms)
    #[serde(default = "default_poll_interval", with = "duration_millis_serde")]
    pub poll_interval: Duration,

    /// Wall-clock bound for the monitor loop (default: 300 seconds)
    #[serde(default = "default_max_wait", with = "duration_serde")]
    pub max_wait: Duration,

    /// Consecutive cycles without a new segment before the monitor gives up (default: 10)
    #[serde(default = "default_stagnation_cycles")]
    pub stagnation_cycles: u32,

    /// File extension of segment artifacts (default: "m4a")
    #[serde(default = "default_segment_extension")]
    pub segment_extension: String,

    /// Handling of segments that failed in an earlier round
    #[serde(default)]
    pub failed_segments: FailedSegmentPolicy,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_segments: default_max_concurrent(),
            poll_interval: default_poll_interval(),
            max_wait: default_max_wait(),
            stagnation_cycles: default_stagnation_cycles(),
            segment_extension: default_segment_extension(),
            failed_segments: FailedSegmentPolicy::default(),
        }
    }
}

/// Retry configuration for transient failures
///
/// With the defaults a failing segment waits 1s, 2s and 4s between its four attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the initial attempt (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// External tool settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to the ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for ffmpeg if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

/// Main configuration for a download session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend location and HTTP behaviour
    #[serde(default)]
    pub backend: BackendConfig,

    /// Directories, concurrency, monitoring limits
    #[serde(default)]
    pub download: DownloadConfig,

    /// Backoff for individual segment fetches
    #[serde(default)]
    pub retry: RetryConfig,

    /// External tools used for assembly
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read config file '{}': {}", path.display(), e),
            ))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Parsed backend base URL
    pub fn backend_url(&self) -> Result<url::Url> {
        url::Url::parse(&self.backend.url)
            .map_err(|e| Error::config("url", format!("invalid backend URL: {e}")))
    }

    /// Check the values that would make a session misbehave rather than merely fail.
    pub fn validate(&self) -> Result<()> {
        let url = self.backend_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                "url",
                format!("backend URL must be http or https, got {}", url.scheme()),
            ));
        }
        if self.backend.request_timeout.is_zero() {
            return Err(Error::config("request_timeout", "must be positive"));
        }
        if self.download.max_concurrent_segments == 0 {
            return Err(Error::config(
                "max_concurrent_segments",
                "at least one concurrent segment is required",
            ));
        }
        if self.download.stagnation_cycles == 0 {
            return Err(Error::config("stagnation_cycles", "must be at least 1"));
        }
        let ext = &self.download.segment_extension;
        if ext.is_empty() || ext.contains(&['/', '\\', '.'][..]) {
            return Err(Error::config(
                "segment_extension",
                format!("{ext:?} is not a bare file extension"),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::config("backoff_multiplier", "must be >= 1.0"));
        }
        Ok(())
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; SegmentDownloader/{})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_wait() -> Duration {
    Duration::from_secs(300)
}

fn default_stagnation_cycles() -> u32 {
    10
}

fn default_segment_extension() -> String {
    "m4a".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_true() -> bool {
    true
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
