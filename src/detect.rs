//! Change detection between the stored snapshot and a fresh listing.

use crate::types::{Stage, StagesSnapshot};
use std::collections::HashMap;

/// Why a run has nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// Both listings carry the same revision hash.
    HashUnchanged,
    /// The hash moved (or is missing) but no stage's marker changed.
    NoStagesChanged,
}

/// What a run should refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    /// No previous state: refresh every stage.
    FullSync,
    /// Refresh exactly these stages, in listing order.
    PartialSync { stages: Vec<String> },
    /// Nothing changed since the last run.
    NoOp(NoOpReason),
}

impl SyncDecision {
    /// Whether `current` should be written back as the new snapshot.
    ///
    /// An unchanged hash means the stored file already describes `current`.
    pub fn persists_snapshot(&self) -> bool {
        !matches!(self, SyncDecision::NoOp(NoOpReason::HashUnchanged))
    }

    /// The stages of `current` this decision selects.
    pub fn selected_stages<'a>(&self, current: &'a StagesSnapshot) -> Vec<&'a Stage> {
        match self {
            SyncDecision::FullSync => current.stages.iter().collect(),
            SyncDecision::PartialSync { stages } => current
                .stages
                .iter()
                .filter(|s| stages.contains(&s.name))
                .collect(),
            SyncDecision::NoOp(_) => Vec::new(),
        }
    }
}

/// Decides what to refresh given the previous and current listings.
pub fn detect_changes(previous: Option<&StagesSnapshot>, current: &StagesSnapshot) -> SyncDecision {
    let Some(previous) = previous else {
        return SyncDecision::FullSync;
    };

    if let (Some(old), Some(new)) = (previous.git_hash(), current.git_hash()) {
        if old == new {
            return SyncDecision::NoOp(NoOpReason::HashUnchanged);
        }
    }

    let previous_markers: HashMap<&str, &Stage> = previous
        .stages
        .iter()
        .map(|s| (s.name.as_str(), s))
        .collect();

    let changed: Vec<String> = current
        .stages
        .iter()
        .filter(|stage| match previous_markers.get(stage.name.as_str()) {
            Some(prev) => prev.marker() != stage.marker(),
            None => true,
        })
        .map(|stage| stage.name.clone())
        .collect();

    if changed.is_empty() {
        SyncDecision::NoOp(NoOpReason::NoStagesChanged)
    } else {
        SyncDecision::PartialSync { stages: changed }
    }
}
