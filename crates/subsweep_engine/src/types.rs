use std::sync::Arc;

use subsweep_core::{ContextId, FailureReason};

/// Produces a timestamp string on demand (RFC 3339 for job records, `YYYY-MM-DD`
/// for export stamps).
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// A cross-context message could not be delivered or answered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("no executor is listening in {0}")]
    NotListening(ContextId),
    #[error("{0} no longer exists")]
    ContextClosed(ContextId),
    #[error("executor in {0} dropped the request")]
    Disconnected(ContextId),
    #[error("page error: {0}")]
    Page(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<TransportError> for FailureReason {
    fn from(err: TransportError) -> Self {
        FailureReason::Transport {
            message: err.to_string(),
        }
    }
}

/// Outcome of a best-effort notification. Callers may ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "inspect or explicitly ignore the delivery outcome"]
pub enum Delivery {
    Delivered { listeners: usize },
    NoListener,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered { .. })
    }
}
