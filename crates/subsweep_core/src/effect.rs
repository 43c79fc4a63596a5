use crate::{ChannelTarget, ContextId, JobSummary, PersistedState, RequestError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Answer to the request that produced this effect.
    Reply(Reply),
    /// Replace the durable record with this one.
    Persist(PersistedState),
    /// Point `context` at `url` and report back once it has loaded.
    Navigate {
        context: ContextId,
        index: usize,
        url: String,
    },
    /// Make sure an executor answers in `context` before acting on target `index`.
    EnsureReady { context: ContextId, index: usize },
    /// Send PerformAction for `target` to the executor in `context`.
    DispatchAction {
        context: ContextId,
        index: usize,
        target: ChannelTarget,
    },
    /// Wait the pacing delay, then deliver `Msg::PacingElapsed`.
    SchedulePacing,
    /// The job reached a terminal state.
    Finished(JobSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Accepted { total: usize },
    Rejected(RequestError),
    Stopped { message: String },
}
