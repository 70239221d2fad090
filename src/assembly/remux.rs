//! Lossless remux through an external tool

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::ToolsConfig;
use crate::error::{AssemblyError, Result};

/// Joins the files listed in a concat manifest into one container without re-encoding
#[async_trait]
pub trait Remuxer: Send + Sync {
    /// Remux every file listed in `manifest`, in order, into `output`
    async fn remux(&self, manifest: &Path, output: &Path) -> Result<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// ffmpeg-backed [`Remuxer`] using the concat demuxer and stream copy
///
/// # Examples
///
/// ```no_run
/// use segment_dl::assembly::FfmpegRemuxer;
///
/// let remuxer = FfmpegRemuxer::from_path().expect("ffmpeg not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegRemuxer {
    binary_path: PathBuf,
}

impl FfmpegRemuxer {
    /// Create a remuxer with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Resolve ffmpeg from configuration: the explicit path if it exists, otherwise
    /// a PATH lookup when `search_path` is enabled.
    pub fn discover(tools: &ToolsConfig) -> Option<Self> {
        if let Some(path) = &tools.ffmpeg_path {
            if path.is_file() {
                return Some(Self::new(path.clone()));
            }
            tracing::warn!(path = %path.display(), "Configured ffmpeg path does not exist");
        }
        if tools.search_path {
            return Self::from_path();
        }
        None
    }

    /// Path of the ffmpeg binary this remuxer runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl Remuxer for FfmpegRemuxer {
    async fn remux(&self, manifest: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.binary_path);
        command
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
            .kill_on_drop(true);

        tracing::info!(
            binary = %self.binary_path.display(),
            manifest = %manifest.display(),
            output = %output.display(),
            "Running ffmpeg concat"
        );

        let result = command
            .output()
            .await
            .map_err(|source| AssemblyError::RemuxLaunch {
                tool: self.binary_path.clone(),
                source,
            })?;

        if result.status.success() {
            return Ok(());
        }

        Err(AssemblyError::RemuxFailed {
            status: result.status.to_string(),
            stderr: stderr_tail(&result.stderr, 20),
        }
        .into())
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

/// Last `max_lines` lines of a tool's stderr; ffmpeg prints its banner first
/// and the actual error last.
fn stderr_tail(stderr: &[u8], max_lines: usize) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.trim().lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
