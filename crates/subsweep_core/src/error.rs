use serde::{Deserialize, Serialize};

/// Rejections of StartJob / StopJob / resume requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestError {
    #[error("invalid request: target list is empty")]
    EmptyTargets,
    #[error("invalid request: a job is already running")]
    AlreadyRunning,
    #[error("invalid request: no unsubscribe job is running")]
    NoActiveJob,
    #[error("invalid request: no interrupted job to resume")]
    NothingToResume,
}
