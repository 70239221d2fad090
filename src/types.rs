//! Core types for segment-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Index of one segment of an asset
pub type SegmentIndex = u32;

/// Length of a valid asset identifier
pub const ASSET_ID_LEN: usize = 11;

/// Validated external asset identifier (e.g. a video id)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Validate and wrap an identifier
    pub fn parse(raw: &str) -> Result<Self> {
        let valid = raw.len() == ASSET_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::InvalidAssetId(raw.to_string()))
        }
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssetId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for AssetId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One download session: which asset, from where, into which directory.
///
/// Immutable once built. The job directory belongs to this job alone; two jobs
/// must never share it.
#[derive(Clone, Debug)]
pub struct Job {
    asset_id: AssetId,
    backend_url: Url,
    job_dir: PathBuf,
    extension: String,
}

impl Job {
    /// Build a job whose artifacts live in `<download_root>/<asset_id>/`
    pub fn new(
        asset_id: AssetId,
        backend_url: Url,
        download_root: &Path,
        extension: impl Into<String>,
    ) -> Self {
        let job_dir = download_root.join(asset_id.as_str());
        Self {
            asset_id,
            backend_url,
            job_dir,
            extension: extension.into(),
        }
    }

    /// Asset this job downloads
    pub fn asset_id(&self) -> &AssetId {
        &self.asset_id
    }

    /// Backend base address
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// Directory holding this job's segment artifacts
    pub fn job_dir(&self) -> &Path {
        &self.job_dir
    }

    /// Final on-disk location of a segment artifact
    pub fn segment_path(&self, index: SegmentIndex) -> PathBuf {
        self.job_dir
            .join(format!("segment_{}.{}", index, self.extension))
    }

    /// Temporary location a segment is streamed into before it is moved into place
    pub fn partial_segment_path(&self, index: SegmentIndex) -> PathBuf {
        self.job_dir
            .join(format!("segment_{}.{}.part", index, self.extension))
    }
}

/// Per-segment lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    /// Known, not yet attempted
    Pending,
    /// A fetch is running
    InFlight,
    /// Artifact is on disk with non-zero size
    Downloaded,
    /// Retry budget exhausted
    Failed,
}

/// What the backend reported on one status poll
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendStatus {
    /// Segments the backend can serve right now
    pub ready: BTreeSet<SegmentIndex>,
    /// Expected total segment count, when the backend knows it
    pub total: Option<u32>,
}

impl BackendStatus {
    /// The "no new information" status used when a poll fails
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Read-only view over the session's segment states
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    /// Number of downloaded segments
    pub downloaded_count: usize,
    /// Number of failed segments
    pub failed_count: usize,
    /// Downloaded segment indices, ascending
    pub downloaded: Vec<SegmentIndex>,
    /// Failed segment indices, ascending
    pub failed: Vec<SegmentIndex>,
}

/// Result of fetching one segment
#[derive(Debug)]
pub struct SegmentOutcome {
    /// Segment index
    pub index: SegmentIndex,
    /// Number of requests issued; 0 when the artifact was already on disk
    pub attempts: u32,
    /// Artifact size on success, last error on failure
    pub result: Result<u64>,
}

impl SegmentOutcome {
    /// Whether the artifact is on disk
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Why the monitor loop stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The backend's total is reached
    AllComplete,
    /// Too many consecutive cycles without a new segment
    Stagnant,
    /// The wall-clock bound elapsed
    TimedOut,
    /// The cancellation token fired
    UserCancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::AllComplete => "all segments complete",
            StopReason::Stagnant => "no new segments",
            StopReason::TimedOut => "timed out",
            StopReason::UserCancelled => "cancelled by user",
        };
        f.write_str(s)
    }
}

/// Terminal result of a monitoring session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorOutcome {
    /// Why monitoring stopped
    pub reason: StopReason,
    /// All downloaded segment indices at the moment of stopping, ascending
    pub downloaded: Vec<SegmentIndex>,
    /// Completed poll/dispatch cycles
    pub cycles: u32,
    /// Wall-clock time spent monitoring
    pub elapsed: Duration,
}

/// Event emitted during a download session
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Backend status was polled
    StatusPolled {
        /// Number of segments the backend reports ready
        ready: usize,
        /// Expected total, if known
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u32>,
    },

    /// A segment response arrived and its body is being written
    SegmentStarted {
        /// Segment index
        index: SegmentIndex,
        /// Body size from `content-length`, if sent
        #[serde(skip_serializing_if = "Option::is_none")]
        total_bytes: Option<u64>,
    },

    /// A segment is on disk
    SegmentDownloaded {
        /// Segment index
        index: SegmentIndex,
        /// Artifact size in bytes
        bytes: u64,
    },

    /// A segment exhausted its retries
    SegmentFailed {
        /// Segment index
        index: SegmentIndex,
        /// Last error
        error: String,
        /// Requests issued
        attempts: u32,
    },

    /// Monitoring finished
    MonitorStopped {
        /// Why it stopped
        reason: StopReason,
        /// Downloaded segment count
        downloaded: usize,
    },
}
