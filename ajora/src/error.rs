//! Error types for the orchestration core.
//!
//! [`ErrorCode`] is the taxonomy reported to subscribers through `on_error`; the `thiserror`
//! enums are what functions actually return. Agent implementations report [`AgentError`],
//! tool handlers report [`ToolHandlerError`], runtime discovery reports [`RuntimeError`], and
//! the façade surfaces [`CoreError`] to callers that await a run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes surfaced through the subscriber `on_error` channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RuntimeInfoFetchFailed,
    AgentConnectFailed,
    AgentRunFailed,
    AgentRunFailedEvent,
    AgentRunErrorEvent,
    ToolArgumentParseFailed,
    ToolHandlerFailed,
}

impl ErrorCode {
    /// Wire name, e.g. `"TOOL_HANDLER_FAILED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuntimeInfoFetchFailed => "RUNTIME_INFO_FETCH_FAILED",
            Self::AgentConnectFailed => "AGENT_CONNECT_FAILED",
            Self::AgentRunFailed => "AGENT_RUN_FAILED",
            Self::AgentRunFailedEvent => "AGENT_RUN_FAILED_EVENT",
            Self::AgentRunErrorEvent => "AGENT_RUN_ERROR_EVENT",
            Self::ToolArgumentParseFailed => "TOOL_ARGUMENT_PARSE_FAILED",
            Self::ToolHandlerFailed => "TOOL_HANDLER_FAILED",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by an [`Agent`](crate::agent::Agent) implementation.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The run failed (model error, remote failure, scripted failure).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The run was cancelled through `abort_run`.
    #[error("run aborted")]
    Aborted,

    /// Transport-level failure talking to a remote agent.
    #[error("transport error: {0}")]
    Transport(String),

    /// A remote response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Error returned by a frontend tool handler. Recorded in the tool-result message; never fatal.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ToolHandlerError(pub String);

impl ToolHandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for ToolHandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ToolHandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

/// Runtime discovery failure (`RUNTIME_INFO_FETCH_FAILED`).
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("runtime returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid runtime response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure building a [`CoreConfig`](crate::CoreConfig) from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("load config: {0}")]
    Load(#[from] env_config::LoadError),

    #[error("invalid AJORA_RUNTIME_TRANSPORT: {0}")]
    Transport(String),
}

/// Error surfaced by the façade to callers awaiting a run or connect.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Programmer error at setup time: no agent registered under this id.
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// The agent's own run rejected (`AGENT_RUN_FAILED`).
    #[error("agent run failed: {0}")]
    AgentRunFailed(#[source] AgentError),

    /// `connect()` on the agent rejected (`AGENT_CONNECT_FAILED`).
    #[error("agent connect failed: {0}")]
    AgentConnectFailed(#[source] AgentError),

    /// A tool call carried non-empty arguments that are not valid JSON
    /// (`TOOL_ARGUMENT_PARSE_FAILED`). Fatal to the run.
    #[error("failed to parse arguments for tool '{tool_name}': {source}")]
    ToolArgumentParse {
        tool_name: String,
        tool_call_id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    /// The subscriber-facing code for this error, when it has one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::AgentNotFound(_) => None,
            Self::AgentRunFailed(_) => Some(ErrorCode::AgentRunFailed),
            Self::AgentConnectFailed(_) => Some(ErrorCode::AgentConnectFailed),
            Self::ToolArgumentParse { .. } => Some(ErrorCode::ToolArgumentParseFailed),
        }
    }
}
