use crate::{ActionOutcome, ChannelTarget, ContextId, FailureReason, PersistedState};

/// Inputs to the coordinator. Timestamps are RFC 3339 strings supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// StartJob: begin a run over `targets` in the `owner` context.
    StartRequested {
        targets: Vec<ChannelTarget>,
        owner: ContextId,
        at: String,
    },
    /// Continue an interrupted run from its persisted record.
    ResumeRequested {
        persisted: PersistedState,
        owner: ContextId,
        at: String,
    },
    /// StopJob.
    StopRequested { at: String },
    /// The owner context finished loading the target page.
    NavigationCompleted { context: ContextId },
    NavigationFailed {
        context: ContextId,
        reason: FailureReason,
    },
    /// An executor announced (or was probed) ready in `context` while target
    /// `index` was current.
    ExecutorReady { context: ContextId, index: usize },
    ReadinessFailed {
        context: ContextId,
        index: usize,
        reason: FailureReason,
    },
    /// Result of the PerformAction request for target `index`.
    ActionFinished {
        context: ContextId,
        index: usize,
        outcome: ActionOutcome,
    },
    /// The inter-item pacing delay ran out.
    PacingElapsed { at: String },
    NoOp,
}
