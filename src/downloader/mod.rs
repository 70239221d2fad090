//! Segment download session split into focused submodules.
//!
//! The `SegmentDownloader` struct and its methods are organized by concern:
//! - [`state`] - Per-segment state table
//! - [`fetch`] - Single-segment fetch with retry
//! - [`coordinator`] - Bounded concurrent dispatch
//! - [`monitor`] - Poll/dispatch/sleep loop and stopping criteria
//! - [`combine`] - Handing downloaded segments to the assembler

mod combine;
mod coordinator;
mod fetch;
mod monitor;
mod state;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{
    BackendStatus, Event, Job, ProgressSnapshot, SegmentIndex, SegmentOutcome, SegmentState,
};

use state::SegmentStates;

/// Everything a fetch worker needs, shared read-only across workers
pub(crate) struct FetchContext {
    pub(crate) job: Job,
    pub(crate) config: Arc<Config>,
    pub(crate) client: BackendClient,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    pub(crate) cancel_token: CancellationToken,
}

/// One download session for one asset
///
/// Holds the segment state table. Methods that change it take `&mut self`, so a
/// session's monitor loop never runs concurrently with itself.
pub struct SegmentDownloader {
    ctx: Arc<FetchContext>,
    states: SegmentStates,
}

impl SegmentDownloader {
    /// Create a session for `job`, creating its download directory.
    pub async fn new(job: Job, config: Config) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(job.job_dir()).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create download directory '{}': {}",
                    job.job_dir().display(),
                    e
                ),
            ))
        })?;

        let client = BackendClient::new(&crate::config::BackendConfig {
            url: job.backend_url().to_string(),
            ..config.backend.clone()
        })?;

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        tracing::info!(
            asset_id = %job.asset_id(),
            backend = %job.backend_url(),
            directory = %job.job_dir().display(),
            "Initialized segment downloader"
        );

        Ok(Self {
            ctx: Arc::new(FetchContext {
                job,
                config: Arc::new(config),
                client,
                event_tx,
                cancel_token: CancellationToken::new(),
            }),
            states: SegmentStates::default(),
        })
    }

    /// The job this session downloads
    pub fn job(&self) -> &Job {
        &self.ctx.job
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.ctx.config
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.ctx.event_tx.subscribe()
    }

    /// Token that stops the session cooperatively when cancelled
    ///
    /// Running requests finish their current attempt; no new request starts.
    pub fn cancel_token(&self) -> CancellationToken {
        self.ctx.cancel_token.clone()
    }

    /// Current state of one segment, if the session has seen it
    pub fn segment_state(&self, index: SegmentIndex) -> Option<SegmentState> {
        self.states.get(index)
    }

    /// Counts and sorted lists of downloaded and failed segments
    pub fn snapshot(&self) -> ProgressSnapshot {
        self.states.snapshot()
    }

    /// Poll the backend once. Failures come back as [`BackendStatus::unknown`].
    pub async fn probe(&self) -> BackendStatus {
        let status = self.ctx.client.probe(self.ctx.job.asset_id()).await;
        self.ctx
            .event_tx
            .send(Event::StatusPolled {
                ready: status.ready.len(),
                total: status.total,
            })
            .ok();
        status
    }

    /// Fetch a single segment without touching the session's state table.
    pub async fn fetch(&self, index: SegmentIndex) -> SegmentOutcome {
        fetch::fetch_segment(&self.ctx, index).await
    }

    /// Fetch `indices` with the configured concurrency and record the results.
    ///
    /// Returns every downloaded index of the session so far, ascending.
    pub async fn dispatch(
        &mut self,
        indices: impl IntoIterator<Item = SegmentIndex>,
    ) -> Vec<SegmentIndex> {
        let width = self.ctx.config.download.max_concurrent_segments;
        self.dispatch_with_width(indices, width).await
    }

    /// [`dispatch`](Self::dispatch) with an explicit concurrency width
    pub async fn dispatch_with_width(
        &mut self,
        indices: impl IntoIterator<Item = SegmentIndex>,
        width: usize,
    ) -> Vec<SegmentIndex> {
        coordinator::dispatch(&self.ctx, &mut self.states, indices, width).await
    }

    /// One probe and one dispatch over whatever the backend reports ready.
    pub async fn download_available(&mut self) -> Vec<SegmentIndex> {
        let status = self.probe().await;
        if status.ready.is_empty() {
            tracing::warn!(asset_id = %self.ctx.job.asset_id(), "No segments available for download");
            return self.states.downloaded();
        }
        self.dispatch(status.ready).await
    }

    /// Move every failed segment back to pending so the next dispatch retries it.
    ///
    /// Returns the re-queued indices, ascending.
    pub fn retry_failed(&mut self) -> Vec<SegmentIndex> {
        let requeued = self.states.requeue_all_failed();
        if !requeued.is_empty() {
            tracing::info!(segments = ?requeued, "Re-queued failed segments");
        }
        requeued
    }
}
