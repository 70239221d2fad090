//! Bounded fan-out of segment fetches over a set of indices.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::config::FailedSegmentPolicy;
use crate::error::Error;
use crate::types::{SegmentIndex, SegmentState};

use super::fetch::fetch_segment;
use super::state::SegmentStates;
use super::FetchContext;

/// Select the indices worth fetching and mark them in flight.
///
/// Downloaded indices are skipped. Failed indices are skipped under
/// [`FailedSegmentPolicy::GiveUp`] and re-queued under
/// [`FailedSegmentPolicy::RetryNextCycle`].
pub(super) fn plan_dispatch(
    states: &mut SegmentStates,
    indices: impl IntoIterator<Item = SegmentIndex>,
    policy: FailedSegmentPolicy,
) -> Vec<SegmentIndex> {
    let requested: BTreeSet<SegmentIndex> = indices.into_iter().collect();
    let mut planned = Vec::with_capacity(requested.len());

    for index in requested {
        states.observe(index);
        if states.get(index) == Some(SegmentState::Failed)
            && policy == FailedSegmentPolicy::RetryNextCycle
        {
            tracing::info!(segment = index, "Re-queuing previously failed segment");
            states.requeue(index);
        }
        if states.begin(index) {
            planned.push(index);
        }
    }

    planned
}

/// Fetch `indices` with at most `width` requests in flight and record each result
/// as it completes.
///
/// Workers only return outcomes; the state table is updated here, serially, in
/// completion order. Fetches abandoned by cancellation go back to Pending.
/// Returns every downloaded index of the session, ascending.
pub(super) async fn dispatch(
    ctx: &Arc<FetchContext>,
    states: &mut SegmentStates,
    indices: impl IntoIterator<Item = SegmentIndex>,
    width: usize,
) -> Vec<SegmentIndex> {
    let planned = plan_dispatch(states, indices, ctx.config.download.failed_segments);

    if planned.is_empty() {
        tracing::debug!("All available segments already handled");
        return states.downloaded();
    }

    tracing::info!(
        asset_id = %ctx.job.asset_id(),
        count = planned.len(),
        segments = ?planned,
        "Downloading segments"
    );

    let mut outcomes = stream::iter(planned)
        .map(|index| {
            let ctx = Arc::clone(ctx);
            async move { fetch_segment(&ctx, index).await }
        })
        .buffer_unordered(width.max(1));

    while let Some(outcome) = outcomes.next().await {
        if matches!(outcome.result, Err(Error::Cancelled)) {
            states.release(outcome.index);
        } else {
            states.finish(outcome.index, outcome.is_success());
        }
    }

    states.downloaded()
}
