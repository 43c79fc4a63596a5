use serde::{Deserialize, Serialize};

use crate::{ChannelTarget, ContextId};

/// The persisted status record read by every observer.
///
/// Writers always replace the whole snapshot, never individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub total_channels: usize,
    pub start_time: Option<String>,
    pub processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub completed: bool,
    pub stopped: bool,
    pub completed_at: Option<String>,
}

impl StatusSnapshot {
    pub(crate) fn running(total_channels: usize, start_time: &str) -> Self {
        Self {
            is_running: true,
            total_channels,
            start_time: Some(start_time.to_string()),
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_running && (self.completed || self.stopped)
    }
}

/// Targets of a job that has not reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingJob {
    pub owner: ContextId,
    pub targets: Vec<ChannelTarget>,
}

/// Everything written to durable storage, as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub status: StatusSnapshot,
    pub pending: Option<PendingJob>,
}

impl PersistedState {
    /// True when the record describes a job that was interrupted mid-run.
    pub fn is_resumable(&self) -> bool {
        self.status.is_running
            && self
                .pending
                .as_ref()
                .is_some_and(|pending| self.status.processed < pending.targets.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEnd {
    Completed,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub end: JobEnd,
    pub total: usize,
    pub processed: usize,
    pub success_count: usize,
    pub error_count: usize,
}
