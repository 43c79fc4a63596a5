use crate::{Phase, SessionState};

/// Snapshot of the coordinator for progress rendering.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CoordinatorView {
    pub session: SessionState,
    pub phase: Option<Phase>,
    pub total: usize,
    pub processed: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// Name of the channel currently being worked on.
    pub current: Option<String>,
}

impl CoordinatorView {
    /// Completion in percent, 0 for an empty run.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.processed.min(self.total) * 100) / self.total) as u8
    }
}
