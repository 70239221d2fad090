//! # segment-dl
//!
//! Client-side orchestrator for segmented media downloads.
//!
//! A remote backend splits an asset into numbered segments and produces them
//! progressively. This crate polls the backend for the segments that are ready,
//! fetches them concurrently with bounded retry, keeps going until every segment
//! is in (or progress stalls, or time runs out), and can combine the result into
//! a single file.
//!
//! ## Design
//!
//! - **One session per asset** - a [`SegmentDownloader`] owns its job directory and state table
//! - **Never blocks on the backend** - a failed status poll just means "nothing new"
//! - **Idempotent** - segments already on disk are never fetched again
//! - **Event-driven** - consumers subscribe to [`Event`]s instead of polling state
//!
//! ## Quick Start
//!
//! ```no_run
//! use segment_dl::{AssetId, Config, Job, SegmentDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let job = Job::new(
//!         AssetId::parse("dQw4w9WgXcQ")?,
//!         config.backend.url.parse()?,
//!         &config.download.download_dir,
//!         config.download.segment_extension.clone(),
//!     );
//!
//!     let mut downloader = SegmentDownloader::new(job, config).await?;
//!     tokio::spawn(segment_dl::cancel_on_signal(downloader.cancel_token()));
//!
//!     let outcome = downloader.monitor().await;
//!     println!("stopped: {} ({} segments)", outcome.reason, outcome.downloaded.len());
//!
//!     let output = std::path::Path::new("dQw4w9WgXcQ.m4a");
//!     downloader.combine(output, true).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Combining segments into one output file
pub mod assembly;
/// HTTP client for the segmenting backend
pub mod backend;
/// Configuration types
pub mod config;
/// Download session (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Retry logic with exponential backoff
pub mod retry;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use assembly::{Assembler, AssemblyReport, CombineMethod, FfmpegRemuxer, Remuxer};
pub use backend::BackendClient;
pub use config::{
    BackendConfig, Config, DownloadConfig, FailedSegmentPolicy, RetryConfig, ToolsConfig,
};
pub use downloader::SegmentDownloader;
pub use error::{AssemblyError, Error, Result};
pub use types::{
    AssetId, BackendStatus, Event, Job, MonitorOutcome, ProgressSnapshot, SegmentIndex,
    SegmentOutcome, SegmentState, StopReason,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal.
///
/// Returns early, without cancelling, if the token is cancelled by someone else.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("Stopping download session");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(_), Err(e)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
