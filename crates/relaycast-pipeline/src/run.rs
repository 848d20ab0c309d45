//! Per-run state tracking and the resources a run owns.

use crate::error::PipelineError;
use relaycast_services::PublishedVideo;
use relaycast_storage::{LocalArtifact, StagedKey};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Authenticating,
    Fetching,
    Staging,
    Materializing,
    Publishing,
    CleaningUp,
    Completed,
    /// Carries the taxonomy name of the first failure.
    Failed(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed(_))
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Authenticating => f.write_str("authenticating"),
            RunState::Fetching => f.write_str("fetching"),
            RunState::Staging => f.write_str("staging"),
            RunState::Materializing => f.write_str("materializing"),
            RunState::Publishing => f.write_str("publishing"),
            RunState::CleaningUp => f.write_str("cleaning_up"),
            RunState::Completed => f.write_str("completed"),
            RunState::Failed(reason) => write!(f, "failed({})", reason),
        }
    }
}

/// Ordered record of the states one run passed through.
#[derive(Debug)]
pub(crate) struct RunTracker {
    run_id: Uuid,
    subject_id: Option<String>,
    history: Vec<RunState>,
}

impl RunTracker {
    pub(crate) fn new(subject_id: Option<String>) -> Self {
        RunTracker {
            run_id: Uuid::new_v4(),
            subject_id,
            history: vec![RunState::Idle],
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn current(&self) -> &RunState {
        // `history` starts with Idle and is only ever pushed to.
        self.history.last().unwrap_or(&RunState::Idle)
    }

    pub(crate) fn transition(&mut self, next: RunState) {
        let subject_id = self.subject_id.as_deref().unwrap_or("-");
        match &next {
            RunState::Failed(reason) => tracing::warn!(
                run_id = %self.run_id,
                subject_id = %subject_id,
                from = %self.current(),
                reason = %reason,
                "Run failed"
            ),
            _ => tracing::info!(
                run_id = %self.run_id,
                subject_id = %subject_id,
                from = %self.current(),
                to = %next,
                "Run state transition"
            ),
        }
        self.history.push(next);
    }

    pub(crate) fn into_history(self) -> Vec<RunState> {
        self.history
    }
}

/// Resources acquired by a run. Everything here is released during cleanup.
#[derive(Debug, Default)]
pub(crate) struct RunResources {
    pub(crate) staged_key: Option<StagedKey>,
    pub(crate) artifact: Option<LocalArtifact>,
}

/// A resource that could not be released. Recorded, never fatal to the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupFailure {
    StagedObject { key: String, message: String },
    LocalArtifact { path: String, message: String },
}

/// Outcome of one run plus what happened along the way.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Every state visited, starting with `Idle` and ending in a terminal state.
    pub states: Vec<RunState>,
    /// Key of the staged object, if one was allocated.
    pub staged_key: Option<String>,
    pub result: Result<PublishedVideo, PipelineError>,
    pub cleanup_failures: Vec<CleanupFailure>,
}

impl RunReport {
    pub fn final_state(&self) -> Option<&RunState> {
        self.states.last()
    }

    pub fn visited(&self, state: &RunState) -> bool {
        self.states.contains(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_records_history() {
        let mut tracker = RunTracker::new(Some("sub-1".to_string()));
        assert_eq!(tracker.current(), &RunState::Idle);

        tracker.transition(RunState::Authenticating);
        tracker.transition(RunState::CleaningUp);
        tracker.transition(RunState::Failed("NotFound".to_string()));

        assert!(tracker.current().is_terminal());
        assert_eq!(
            tracker.into_history(),
            vec![
                RunState::Idle,
                RunState::Authenticating,
                RunState::CleaningUp,
                RunState::Failed("NotFound".to_string()),
            ]
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RunState::CleaningUp.to_string(), "cleaning_up");
        assert_eq!(
            RunState::Failed("PublishError".to_string()).to_string(),
            "failed(PublishError)"
        );
    }
}
