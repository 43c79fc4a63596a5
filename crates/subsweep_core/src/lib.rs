//! Subsweep core: the bulk-unsubscribe job state machine.
//!
//! Everything here is pure: [`update`] applies a [`Msg`] to a [`Coordinator`] and
//! returns the [`Effect`]s the runtime has to carry out.
mod effect;
mod error;
mod msg;
mod outcome;
mod state;
mod status;
mod target;
mod update;
mod view_model;

pub use effect::{Effect, Reply};
pub use error::RequestError;
pub use msg::Msg;
pub use outcome::{ActionOutcome, ControlRole, FailureReason};
pub use state::{ContextId, Coordinator, Job, Phase, SessionState};
pub use status::{JobEnd, JobSummary, PendingJob, PersistedState, StatusSnapshot};
pub use target::{
    is_unsubscribe_token, normalize_channel_url, ChannelRecord, ChannelTarget,
    UNSUBSCRIBE_TOKENS,
};
pub use update::update;
pub use view_model::CoordinatorView;
