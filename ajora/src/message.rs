//! Conversation messages exchanged with agents.
//!
//! Roles: user, assistant (optionally carrying tool calls), tool (result of one tool call),
//! activity (structured UI activity), and system (injected directives). Serialized with a
//! `role` tag and camelCase fields so agents can forward them unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn function_call_type() -> String {
    "function".to_string()
}

/// Name and serialized-JSON arguments of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON text as produced by the model; may be empty.
    pub arguments: String,
}

/// A tool invocation requested by an assistant message.
///
/// The id is unique within the message set it appears in; the tool-result message refers
/// back to it through `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: function_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Activity,
}

/// A single message in an agent's conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    #[serde(rename_all = "camelCase")]
    System { id: String, content: String },

    #[serde(rename_all = "camelCase")]
    User { id: String, content: String },

    #[serde(rename_all = "camelCase")]
    Assistant {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },

    #[serde(rename_all = "camelCase")]
    Tool {
        id: String,
        content: String,
        tool_call_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    Activity {
        id: String,
        activity_type: String,
        content: Value,
    },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            id: new_message_id(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            id: new_message_id(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            id: new_message_id(),
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// Assistant message that requests tool calls; `content` may be empty.
    pub fn assistant_with_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            id: new_message_id(),
            content,
            tool_calls,
        }
    }

    /// Tool-result message answering the call with id `tool_call_id`.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            id: new_message_id(),
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            error: None,
        }
    }

    pub fn activity(activity_type: impl Into<String>, content: Value) -> Self {
        Self::Activity {
            id: new_message_id(),
            activity_type: activity_type.into(),
            content,
        }
    }

    /// Replaces the generated id.
    pub fn with_id(mut self, new_id: impl Into<String>) -> Self {
        let new_id = new_id.into();
        match &mut self {
            Self::System { id, .. }
            | Self::User { id, .. }
            | Self::Assistant { id, .. }
            | Self::Tool { id, .. }
            | Self::Activity { id, .. } => *id = new_id,
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            Self::System { id, .. }
            | Self::User { id, .. }
            | Self::Assistant { id, .. }
            | Self::Tool { id, .. }
            | Self::Activity { id, .. } => id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
            Self::Activity { .. } => Role::Activity,
        }
    }

    /// Tool calls carried by an assistant message; empty for every other role.
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// Plain text content, when the role has one.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::System { content, .. } | Self::User { content, .. } => Some(content),
            Self::Assistant { content, .. } => content.as_deref(),
            Self::Tool { content, .. } => Some(content),
            Self::Activity { .. } => None,
        }
    }
}
