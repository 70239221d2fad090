//! Segment state table, the session's only mutable core.
//!
//! Only the coordinator mutates it, one fetch result at a time.

use std::collections::BTreeMap;

use crate::types::{ProgressSnapshot, SegmentIndex, SegmentState};

/// Mapping from segment index to its current state
#[derive(Debug, Default, Clone)]
pub(crate) struct SegmentStates {
    states: BTreeMap<SegmentIndex, SegmentState>,
}

impl SegmentStates {
    pub(crate) fn get(&self, index: SegmentIndex) -> Option<SegmentState> {
        self.states.get(&index).copied()
    }

    /// Record a newly seen index as Pending. Known indices keep their state.
    pub(crate) fn observe(&mut self, index: SegmentIndex) {
        self.states.entry(index).or_insert(SegmentState::Pending);
    }

    /// Pending → InFlight. Returns false (and changes nothing) from any other state.
    pub(crate) fn begin(&mut self, index: SegmentIndex) -> bool {
        match self.states.get_mut(&index) {
            Some(state @ SegmentState::Pending) => {
                *state = SegmentState::InFlight;
                true
            }
            _ => false,
        }
    }

    /// InFlight → Downloaded | Failed
    pub(crate) fn finish(&mut self, index: SegmentIndex, success: bool) {
        let next = if success {
            SegmentState::Downloaded
        } else {
            SegmentState::Failed
        };
        match self.states.get_mut(&index) {
            Some(state @ SegmentState::InFlight) => *state = next,
            other => {
                tracing::warn!(
                    segment = index,
                    state = ?other,
                    "Ignoring fetch result for segment that is not in flight"
                );
            }
        }
    }

    /// InFlight → Pending, for fetches abandoned by cancellation
    pub(crate) fn release(&mut self, index: SegmentIndex) {
        if let Some(state @ SegmentState::InFlight) = self.states.get_mut(&index) {
            *state = SegmentState::Pending;
        }
    }

    /// Failed → Pending for one index. Returns whether the index was failed.
    pub(crate) fn requeue(&mut self, index: SegmentIndex) -> bool {
        match self.states.get_mut(&index) {
            Some(state @ SegmentState::Failed) => {
                *state = SegmentState::Pending;
                true
            }
            _ => false,
        }
    }

    /// Failed → Pending for every failed index. Returns the re-queued indices, ascending.
    pub(crate) fn requeue_all_failed(&mut self) -> Vec<SegmentIndex> {
        let failed = self.with_state(SegmentState::Failed);
        for index in &failed {
            self.requeue(*index);
        }
        failed
    }

    fn with_state(&self, wanted: SegmentState) -> Vec<SegmentIndex> {
        self.states
            .iter()
            .filter(|(_, state)| **state == wanted)
            .map(|(index, _)| *index)
            .collect()
    }

    /// Downloaded indices, ascending
    pub(crate) fn downloaded(&self) -> Vec<SegmentIndex> {
        self.with_state(SegmentState::Downloaded)
    }

    pub(crate) fn downloaded_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| **s == SegmentState::Downloaded)
            .count()
    }

    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        let downloaded = self.downloaded();
        let failed = self.with_state(SegmentState::Failed);
        ProgressSnapshot {
            downloaded_count: downloaded.len(),
            failed_count: failed.len(),
            downloaded,
            failed,
        }
    }
}
