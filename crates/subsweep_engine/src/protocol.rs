//! Messages exchanged between the orchestrator, the executor and the UI.
//!
//! They serialize to JSON objects so any front end can speak them. Requests are
//! tagged by `action`; responses are told apart by their fields.

use serde::{Deserialize, Serialize};
use subsweep_core::{ActionOutcome, ChannelRecord, ChannelTarget, ContextId, RequestError};

/// Orchestrator -> executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ExecutorRequest {
    Ping,
    PerformAction { target: ChannelTarget },
    ExportSubscriptions,
}

/// Executor -> orchestrator.
///
/// Untagged: a ping answers `{ready}`, an export answers `{success, count}` or
/// `{success: false, error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutorResponse {
    Ready {
        ready: bool,
    },
    Outcome {
        outcome: ActionOutcome,
    },
    Exported {
        success: bool,
        count: usize,
        records: Vec<ChannelRecord>,
    },
    ExportFailed {
        success: bool,
        error: String,
    },
}

impl ExecutorResponse {
    pub fn ready() -> Self {
        ExecutorResponse::Ready { ready: true }
    }

    pub fn export(result: Result<Vec<ChannelRecord>, String>) -> Self {
        match result {
            Ok(records) => ExecutorResponse::Exported {
                success: true,
                count: records.len(),
                records,
            },
            Err(error) => ExecutorResponse::ExportFailed {
                success: false,
                error,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorResponse::Ready { .. } => "ready",
            ExecutorResponse::Outcome { .. } => "outcome",
            ExecutorResponse::Exported { .. } => "exported",
            ExecutorResponse::ExportFailed { .. } => "exportFailed",
        }
    }
}

/// UI -> orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum OrchestratorRequest {
    StartJob {
        targets: Vec<ChannelTarget>,
        context: ContextId,
    },
    StopJob,
}

/// Orchestrator -> UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrchestratorResponse {
    Start {
        accepted: bool,
        total: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Stop {
        success: bool,
        message: String,
    },
}

impl OrchestratorResponse {
    pub fn start(result: Result<usize, RequestError>) -> Self {
        match result {
            Ok(total) => OrchestratorResponse::Start {
                accepted: true,
                total,
                error: None,
            },
            Err(err) => OrchestratorResponse::Start {
                accepted: false,
                total: 0,
                error: Some(err.to_string()),
            },
        }
    }

    pub fn stop(result: Result<String, RequestError>) -> Self {
        match result {
            Ok(message) => OrchestratorResponse::Stop {
                success: true,
                message,
            },
            Err(err) => OrchestratorResponse::Stop {
                success: false,
                message: err.to_string(),
            },
        }
    }
}
