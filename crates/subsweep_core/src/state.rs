use std::fmt;

use serde::{Deserialize, Serialize};

use crate::view_model::CoordinatorView;
use crate::{
    ActionOutcome, ChannelTarget, JobEnd, JobSummary, PendingJob, PersistedState, StatusSnapshot,
};

/// Opaque handle of the page context (tab) a job is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Coarse state shown to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    /// Stop was requested; the item in flight is still draining.
    Stopping,
    Completed,
    Stopped,
}

/// Where the current item is inside one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Navigating,
    AwaitingReadiness,
    Acting,
    Pacing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    targets: Vec<ChannelTarget>,
    cursor: usize,
    success_count: usize,
    error_count: usize,
    cancelled: bool,
    owner: ContextId,
    phase: Phase,
}

impl Job {
    pub(crate) fn new(targets: Vec<ChannelTarget>, owner: ContextId) -> Self {
        Self {
            targets,
            cursor: 0,
            success_count: 0,
            error_count: 0,
            cancelled: false,
            owner,
            phase: Phase::Pacing,
        }
    }

    pub(crate) fn restored(
        targets: Vec<ChannelTarget>,
        owner: ContextId,
        success_count: usize,
        error_count: usize,
    ) -> Self {
        Self {
            cursor: success_count + error_count,
            success_count,
            error_count,
            ..Self::new(targets, owner)
        }
    }

    pub fn targets(&self) -> &[ChannelTarget] {
        &self.targets
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn owner(&self) -> ContextId {
        self.owner
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current(&self) -> Option<&ChannelTarget> {
        self.targets.get(self.cursor)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.cursor >= self.targets.len()
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Counts the outcome of the current item and advances the cursor.
    pub(crate) fn record(&mut self, outcome: &ActionOutcome) {
        if outcome.is_success() {
            self.success_count += 1;
        } else {
            self.error_count += 1;
        }
        self.cursor += 1;
    }

    /// True when `context` owns this job and the job sits in `phase`.
    pub(crate) fn expects(&self, context: ContextId, phase: Phase) -> bool {
        self.owner == context && self.phase == phase
    }
}

/// Authoritative orchestrator state: at most one job plus its status record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Coordinator {
    job: Option<Job>,
    status: StatusSnapshot,
    last_end: Option<JobEnd>,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_ref()
    }

    pub fn status(&self) -> &StatusSnapshot {
        &self.status
    }

    pub fn session(&self) -> SessionState {
        match (&self.job, self.last_end) {
            (Some(job), _) if job.cancelled => SessionState::Stopping,
            (Some(_), _) => SessionState::Running,
            (None, Some(JobEnd::Completed)) => SessionState::Completed,
            (None, Some(JobEnd::Stopped)) => SessionState::Stopped,
            (None, None) => SessionState::Idle,
        }
    }

    pub fn view(&self) -> CoordinatorView {
        CoordinatorView {
            session: self.session(),
            phase: self.job.as_ref().map(Job::phase),
            total: self.status.total_channels,
            processed: self.status.processed,
            success_count: self.status.success_count,
            error_count: self.status.error_count,
            current: self
                .job
                .as_ref()
                .filter(|job| !job.cancelled)
                .and_then(Job::current)
                .map(|target| target.name.clone()),
        }
    }

    /// The record to persist. Pending targets are only kept while the job can
    /// still dispatch work.
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            status: self.status.clone(),
            pending: self
                .job
                .as_ref()
                .filter(|job| !job.cancelled)
                .map(|job| PendingJob {
                    owner: job.owner,
                    targets: job.targets.clone(),
                }),
        }
    }

    pub(crate) fn job_mut(&mut self) -> Option<&mut Job> {
        self.job.as_mut()
    }

    pub(crate) fn begin(&mut self, job: Job, status: StatusSnapshot) {
        self.job = Some(job);
        self.status = status;
        self.last_end = None;
    }

    /// Copies the job counters into the status record.
    pub(crate) fn sync_counts(&mut self) {
        if let Some(job) = &self.job {
            self.status.processed = job.cursor;
            self.status.success_count = job.success_count;
            self.status.error_count = job.error_count;
        }
    }

    /// Marks the running job cancelled and flips the status record to stopped.
    pub(crate) fn mark_stopped(&mut self, at: &str) {
        if let Some(job) = self.job.as_mut() {
            job.cancel();
        }
        self.sync_counts();
        self.status.is_running = false;
        self.status.stopped = true;
        self.status.completed = false;
        self.status.completed_at = Some(at.to_string());
    }

    /// Drops the job and writes the terminal status. Returns the run summary.
    pub(crate) fn finish(&mut self, end: JobEnd, at: &str) -> Option<JobSummary> {
        self.sync_counts();
        let job = self.job.take()?;
        self.status.is_running = false;
        match end {
            JobEnd::Completed => {
                self.status.completed = true;
                self.status.completed_at = Some(at.to_string());
            }
            JobEnd::Stopped => {
                self.status.stopped = true;
                if self.status.completed_at.is_none() {
                    self.status.completed_at = Some(at.to_string());
                }
            }
        }
        self.last_end = Some(end);
        Some(JobSummary {
            end,
            total: job.targets.len(),
            processed: job.cursor,
            success_count: job.success_count,
            error_count: job.error_count,
        })
    }
}
