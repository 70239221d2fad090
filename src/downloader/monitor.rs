//! Monitor loop: poll, dispatch, sleep, until a stopping criterion holds.

use std::time::{Duration, Instant};

use crate::types::{Event, MonitorOutcome, StopReason};

use super::SegmentDownloader;

/// Monitor state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorState {
    Polling,
    Stopped(StopReason),
}

/// Stagnation bookkeeping across cycles
#[derive(Debug)]
pub(super) struct ProgressTracker {
    last_count: usize,
    stagnant_cycles: u32,
    stagnation_limit: u32,
}

impl ProgressTracker {
    pub(super) fn new(initial_count: usize, stagnation_limit: u32) -> Self {
        Self {
            last_count: initial_count,
            stagnant_cycles: 0,
            stagnation_limit,
        }
    }

    /// Record the downloaded count after a cycle and decide whether to stop.
    ///
    /// Completion is checked before stagnation, so a cycle that reaches the
    /// backend's total always reports [`StopReason::AllComplete`]. A total of
    /// zero counts as unknown.
    pub(super) fn record_cycle(&mut self, downloaded: usize, total: Option<u32>) -> Option<StopReason> {
        if downloaded > self.last_count {
            self.last_count = downloaded;
            self.stagnant_cycles = 0;
        } else {
            self.stagnant_cycles += 1;
        }

        if let Some(total) = total.filter(|t| *t > 0)
            && downloaded >= total as usize
        {
            return Some(StopReason::AllComplete);
        }
        if self.stagnant_cycles >= self.stagnation_limit {
            return Some(StopReason::Stagnant);
        }
        None
    }

    pub(super) fn stagnant_cycles(&self) -> u32 {
        self.stagnant_cycles
    }
}

impl SegmentDownloader {
    /// Keep polling the backend and downloading newly ready segments until every
    /// segment is in, progress stalls, the wall-clock bound passes, or the session
    /// is cancelled.
    ///
    /// Returns the sorted downloaded indices at the moment of stopping, whatever the reason.
    pub async fn monitor(&mut self) -> MonitorOutcome {
        let download = &self.ctx.config.download;
        let max_wait = download.max_wait;
        let poll_interval = download.poll_interval;
        let cancel_token = self.ctx.cancel_token.clone();

        tracing::info!(
            asset_id = %self.ctx.job.asset_id(),
            max_wait_secs = max_wait.as_secs(),
            poll_interval_ms = poll_interval.as_millis(),
            stagnation_cycles = download.stagnation_cycles,
            "Starting continuous monitoring"
        );

        let start = Instant::now();
        let mut tracker =
            ProgressTracker::new(self.states.downloaded_count(), download.stagnation_cycles);
        let mut cycles = 0u32;
        let mut state = MonitorState::Polling;

        while state == MonitorState::Polling {
            if cancel_token.is_cancelled() {
                state = MonitorState::Stopped(StopReason::UserCancelled);
                break;
            }
            if start.elapsed() >= max_wait {
                state = MonitorState::Stopped(StopReason::TimedOut);
                break;
            }

            let status = self.probe().await;
            let total = status.total;
            self.dispatch(status.ready).await;
            cycles += 1;

            let downloaded = self.states.downloaded_count();
            let previous = tracker.last_count;
            if let Some(reason) = tracker.record_cycle(downloaded, total) {
                state = MonitorState::Stopped(reason);
                break;
            }
            if downloaded > previous {
                tracing::info!(downloaded, total = ?total, "Downloaded segments so far");
            } else {
                tracing::debug!(
                    stagnant_cycles = tracker.stagnant_cycles(),
                    "No new segments this cycle"
                );
            }

            // A cancel that lands while a dispatch is running is seen at the top of the loop
            let remaining = max_wait.saturating_sub(start.elapsed());
            let pause = poll_interval.min(remaining.max(Duration::from_millis(1)));
            tracing::debug!(wait_ms = pause.as_millis(), "Waiting before next check");
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = cancel_token.cancelled() => {
                    state = MonitorState::Stopped(StopReason::UserCancelled);
                }
            }
        }

        let reason = match state {
            MonitorState::Stopped(reason) => reason,
            MonitorState::Polling => StopReason::UserCancelled,
        };
        let downloaded = self.states.downloaded();

        tracing::info!(
            asset_id = %self.ctx.job.asset_id(),
            reason = %reason,
            downloaded = downloaded.len(),
            cycles,
            "Monitoring completed"
        );
        self.ctx
            .event_tx
            .send(Event::MonitorStopped {
                reason,
                downloaded: downloaded.len(),
            })
            .ok();

        MonitorOutcome {
            reason,
            downloaded,
            cycles,
            elapsed: start.elapsed(),
        }
    }
}
