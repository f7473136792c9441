//! Protocol-level event types (type + payload).
//! Structured payloads (context, configs, suggestions) are carried as `serde_json::Value`;
//! the bridge in `ajora` serializes its own types into them.

use serde::Serialize;
use serde_json::Value;

/// Wire shape for one core event. The envelope (`core_id`, `event_id`) is applied separately.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    ToolExecutionStart {
        tool_call_id: String,
        agent_id: String,
        tool_name: String,
        args: Value,
    },
    ToolExecutionEnd {
        tool_call_id: String,
        agent_id: String,
        tool_name: String,
        result: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AgentsChanged { agent_ids: Vec<String> },
    ContextChanged { context: Value },
    SuggestionsConfigChanged { configs: Value },
    SuggestionsChanged { agent_id: String, suggestions: Value },
    SuggestionsStartedLoading { agent_id: String },
    SuggestionsFinishedLoading { agent_id: String },
    PropertiesChanged { properties: Value },
    HeadersChanged { headers: Value },
    Error {
        code: String,
        message: String,
        context: Value,
    },
    RuntimeConnectionStatusChanged { status: String },
}

impl ProtocolEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
