use std::fmt;

use serde::{Deserialize, Serialize};

/// The page widgets the executor operates, in the order it meets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlRole {
    /// The subscribe/subscribed button on a channel page.
    Subscription,
    /// The "Unsubscribe" entry of the menu the subscription button opens.
    UnsubscribeItem,
    /// Transient toast asking to confirm the unsubscribe.
    ConfirmToast,
    /// Modal confirmation dialog.
    ConfirmDialog,
}

impl fmt::Display for ControlRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlRole::Subscription => "subscription button",
            ControlRole::UnsubscribeItem => "unsubscribe menu item",
            ControlRole::ConfirmToast => "confirmation toast",
            ControlRole::ConfirmDialog => "confirmation dialog",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// Bounded lookup for a control ran out of attempts.
    ControlNotFound { role: ControlRole },
    /// No executor answered in the target context, even after re-injection.
    Unreachable,
    /// A cross-context message could not be delivered.
    Transport { message: String },
    /// The executor did not answer within the dispatch bound.
    Timeout,
    /// The context could not be navigated to the target.
    Navigation { message: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ControlNotFound { role } => write!(f, "{role} not found"),
            FailureReason::Unreachable => write!(f, "unreachable"),
            FailureReason::Transport { message } => write!(f, "transport failure: {message}"),
            FailureReason::Timeout => write!(f, "timed out waiting for the executor"),
            FailureReason::Navigation { message } => write!(f, "navigation failed: {message}"),
        }
    }
}

/// Terminal result of one per-target action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Success,
    Failure { reason: FailureReason },
}

impl ActionOutcome {
    pub fn failure(reason: FailureReason) -> Self {
        ActionOutcome::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success)
    }
}
