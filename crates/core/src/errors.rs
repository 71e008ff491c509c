use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::domain::conversation::{RunId, RunStatus};

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error("upstream failure: {0}")]
    Upstream(String),
    #[error("background task stopped before finishing: {0}")]
    TaskAborted(String),
    #[error("assistant run ended with status `{status}`")]
    RunFailedTerminal { status: RunStatus, last_error: Option<Value> },
    #[error("assistant run did not finish within {}s", elapsed.as_secs())]
    Timeout { run_id: RunId, elapsed: Duration },
    #[error("assistant run `{run_id}` completed without an assistant reply")]
    EmptyReply { run_id: RunId },
    #[error("tool call `{tool_call_id}` carried malformed arguments: {reason}")]
    MalformedToolArguments { tool_call_id: String, reason: String },
}

/// Coarse classification used by transport layers to pick a response shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    RunFailed,
    Timeout,
    Critical,
}

impl ApplicationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RunFailedTerminal { .. } => ErrorClass::RunFailed,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Upstream(_)
            | Self::TaskAborted(_)
            | Self::EmptyReply { .. }
            | Self::MalformedToolArguments { .. } => ErrorClass::Critical,
        }
    }

    /// Detail payload attached to failure responses, when the error carries one.
    pub fn details(&self) -> Option<Value> {
        match self {
            Self::RunFailedTerminal { last_error, .. } => last_error.clone(),
            Self::Timeout { run_id, elapsed } => Some(serde_json::json!({
                "run_id": run_id.0,
                "elapsed_secs": elapsed.as_secs(),
            })),
            _ => None,
        }
    }
}
