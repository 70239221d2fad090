//! Combining downloaded segments into one output file
//!
//! Two methods, chosen per call:
//! - [`CombineMethod::Remux`]: the segments are listed in a concat manifest and
//!   handed to a [`Remuxer`] (ffmpeg by default), which rewrites them into one
//!   container without re-encoding.
//! - [`CombineMethod::Concat`]: the raw bytes are appended in index order. This
//!   is only correct for formats that tolerate plain concatenation; fragmented
//!   MP4 segments that each carry their own header may not play end to end.

mod concat;
mod remux;

pub use remux::{FfmpegRemuxer, Remuxer};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ToolsConfig;
use crate::error::{AssemblyError, Result};
use crate::types::{Job, SegmentIndex};
use crate::utils::{concat_manifest_line, nonempty_file_len, remove_file_if_exists};

/// Name of the transient concat manifest inside the job directory
pub const MANIFEST_FILE_NAME: &str = "segments_list.txt";

/// How the output file was produced
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMethod {
    /// Lossless container remux through an external tool
    Remux,
    /// Raw byte concatenation in index order
    Concat,
}

/// Summary of a successful combine
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    /// Output file
    pub output: PathBuf,
    /// Method actually used
    pub method: CombineMethod,
    /// Segment indices that went into the output, ascending
    pub segments: Vec<SegmentIndex>,
    /// Size of the output file in bytes
    pub bytes: u64,
}

/// Combines a job's segment artifacts into a single file
#[derive(Clone, Default)]
pub struct Assembler {
    remuxer: Option<Arc<dyn Remuxer>>,
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("remuxer", &self.remuxer.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl Assembler {
    /// Create an assembler with an optional remux backend
    pub fn new(remuxer: Option<Arc<dyn Remuxer>>) -> Self {
        Self { remuxer }
    }

    /// Create an assembler using ffmpeg if it can be found
    pub fn from_config(tools: &ToolsConfig) -> Self {
        let remuxer = FfmpegRemuxer::discover(tools);
        match &remuxer {
            Some(ffmpeg) => {
                tracing::debug!(binary = %ffmpeg.binary_path().display(), "Found ffmpeg")
            }
            None => tracing::debug!("ffmpeg not available, only byte concatenation is possible"),
        }
        Self::new(remuxer.map(|r| Arc::new(r) as Arc<dyn Remuxer>))
    }

    /// Whether a remux backend is configured
    pub fn remux_available(&self) -> bool {
        self.remuxer.is_some()
    }

    /// Combine the artifacts of `indices` into `output`, in ascending index order.
    ///
    /// With `prefer_remux` set and a remuxer available, the segments are remuxed;
    /// a remux failure is returned as is and does not fall back to concatenation.
    /// Otherwise the raw bytes are appended. Indices whose artifact is missing or
    /// empty are skipped with a warning. On failure no partial output is left.
    pub async fn combine(
        &self,
        job: &Job,
        indices: &[SegmentIndex],
        output: &Path,
        prefer_remux: bool,
    ) -> Result<AssemblyReport> {
        if indices.is_empty() {
            return Err(AssemblyError::NoSegments.into());
        }

        let mut ordered = indices.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut segments = Vec::with_capacity(ordered.len());
        let mut paths = Vec::with_capacity(ordered.len());
        for index in ordered {
            let path = job.segment_path(index);
            if nonempty_file_len(&path).await.is_some() {
                segments.push(index);
                paths.push(path);
            } else {
                tracing::warn!(segment = index, path = %path.display(), "Segment file missing, skipping");
            }
        }

        if paths.is_empty() {
            return Err(AssemblyError::NoSegmentFiles.into());
        }

        tracing::info!(
            asset_id = %job.asset_id(),
            count = paths.len(),
            output = %output.display(),
            "Combining segments"
        );

        let method = match (&self.remuxer, prefer_remux) {
            (Some(remuxer), true) => {
                remux_segments(remuxer.as_ref(), job, &paths, output).await?;
                CombineMethod::Remux
            }
            (None, true) => {
                tracing::warn!(
                    "Remux tool unavailable, falling back to byte concatenation; \
                     the output may not play for container formats"
                );
                concat::concatenate(&paths, output).await?;
                CombineMethod::Concat
            }
            (_, false) => {
                concat::concatenate(&paths, output).await?;
                CombineMethod::Concat
            }
        };

        let bytes = tokio::fs::metadata(output)
            .await
            .map_err(|source| AssemblyError::Io {
                path: output.to_path_buf(),
                source,
            })?
            .len();

        tracing::info!(
            output = %output.display(),
            method = ?method,
            bytes,
            "Combined segments"
        );

        Ok(AssemblyReport {
            output: output.to_path_buf(),
            method,
            segments,
            bytes,
        })
    }
}

/// Removes the concat manifest when dropped, on success and failure alike
struct ManifestGuard {
    path: PathBuf,
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove concat manifest")
            }
        }
    }
}

async fn write_manifest(job: &Job, paths: &[PathBuf]) -> Result<ManifestGuard> {
    let manifest_path = job.job_dir().join(MANIFEST_FILE_NAME);
    let guard = ManifestGuard {
        path: manifest_path.clone(),
    };

    let mut contents = String::new();
    for path in paths {
        // The concat demuxer resolves relative entries against the manifest's directory
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|source| AssemblyError::Io {
                path: path.clone(),
                source,
            })?;
        contents.push_str(&concat_manifest_line(&absolute));
    }

    tokio::fs::write(&manifest_path, contents)
        .await
        .map_err(|source| AssemblyError::Io {
            path: manifest_path.clone(),
            source,
        })?;
    Ok(guard)
}

async fn remux_segments(
    remuxer: &dyn Remuxer,
    job: &Job,
    paths: &[PathBuf],
    output: &Path,
) -> Result<()> {
    let manifest = write_manifest(job, paths).await?;

    tracing::info!(tool = remuxer.name(), "Remuxing segments");
    if let Err(e) = remuxer.remux(&manifest.path, output).await {
        tracing::error!(tool = remuxer.name(), error = %e, "Remux failed");
        remove_file_if_exists(output).await;
        return Err(e);
    }

    if nonempty_file_len(output).await.is_none() {
        remove_file_if_exists(output).await;
        return Err(AssemblyError::RemuxEmptyOutput {
            path: output.to_path_buf(),
        }
        .into());
    }
    Ok(())
}
