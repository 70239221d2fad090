//! Error types for segment-dl
//!
//! Per-segment failures never abort a session: the fetcher absorbs them into a
//! [`crate::types::SegmentOutcome`] after its retry budget is spent, and the status
//! probe absorbs malformed responses into an empty [`crate::types::BackendStatus`].
//! The variants here surface only where a caller has to act on them: configuration,
//! input validation, and assembly.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for segment-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for segment-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "max_concurrent_segments")
        key: Option<String>,
    },

    /// Asset identifier failed validation
    #[error("invalid asset id {0:?}: expected 11 characters from [A-Za-z0-9_-]")]
    InvalidAssetId(String),

    /// Transport-level failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Backend answered with a non-2xx status
    #[error("backend returned HTTP {status} for {url}")]
    Http {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Backend answered with an empty body for a segment
    #[error("segment {index} downloaded with zero length")]
    EmptySegment {
        /// Segment index
        index: u32,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Combining segments into one output failed
    #[error("assembly error: {0}")]
    Assembly(#[from] AssemblyError),

    /// External tool execution failed (ffmpeg)

    /// Operation not supported (missing binary, unusable URL, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The session's cancellation token fired before the operation could finish
    #[error("operation cancelled")]
    Cancelled,
}

/// Errors from the combine step
///
/// Fatal to the combine operation only. Downloaded segments stay on disk.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// No segment is in the Downloaded state
    #[error("no downloaded segments to combine")]
    NoSegments,

    /// Segments are marked downloaded but none of their files exist
    #[error("no segment files found on disk")]
    NoSegmentFiles,

    /// Remux tool exited unsuccessfully
    #[error("remux exited with {status}: {stderr}")]
    RemuxFailed {
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// Remux tool could not be started
    #[error("failed to launch {tool}: {source}")]
    RemuxLaunch {
        /// Binary that was executed
        tool: PathBuf,
        /// Spawn error
        #[source]
        source: std::io::Error,
    },

    /// Remux tool exited successfully but wrote nothing
    #[error("remux produced no output at {path}")]
    RemuxEmptyOutput {
        /// Expected output file
        path: PathBuf,
    },

    /// Reading a segment or writing the output failed
    #[error("I/O failure on {path}: {source}")]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Shorthand for a configuration error tied to one key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
