//! Frontend tools: capabilities the model may call that execute in-process.
//!
//! A [`FrontendTool`] is either global (`agent_id == None`, visible to every agent) or scoped
//! to one agent. [`ToolRegistry`] keeps the flat ordered list the run handler resolves
//! against, and builds the [`ToolDefinition`] list sent to the model with each run.

mod handler;
mod registry;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ToolHandlerError;
use crate::message::ToolCall;

pub use handler::{handler_fn, FnToolHandler, ToolHandler};
pub use registry::ToolRegistry;

/// Tool name that catches calls to tools with no registration of their own.
pub const WILDCARD_TOOL_NAME: &str = "*";

/// Tool definition wire format sent to the model: `{name, description?, parameters}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-schema-like parameter shape.
    pub parameters: Value,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

/// A named in-process capability exposed to the model.
#[derive(Clone)]
pub struct FrontendTool {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema for the arguments; an empty object schema is sent when absent.
    pub parameters: Option<Value>,
    /// Display-only tools have no handler; their calls produce no tool-result message.
    pub handler: Option<Arc<dyn ToolHandler>>,
    /// Whether the model should get another turn after this tool ran. Defaults to `true`.
    pub follow_up: bool,
    /// Restricts the tool to one agent; `None` makes it global.
    pub agent_id: Option<String>,
}

impl FrontendTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: None,
            handler: None,
            follow_up: true,
            agent_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Shorthand for `with_handler(handler_fn(f))`.
    pub fn with_handler_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Value, ToolCall) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value, ToolHandlerError>> + Send + 'static,
    {
        self.with_handler(handler_fn(f))
    }

    pub fn with_follow_up(mut self, follow_up: bool) -> Self {
        self.follow_up = follow_up;
        self
    }

    pub fn for_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// True when the tool is global or scoped to `agent_id`.
    pub fn applies_to(&self, agent_id: Option<&str>) -> bool {
        match (&self.agent_id, agent_id) {
            (None, _) => true,
            (Some(scope), Some(id)) => scope == id,
            (Some(_), None) => false,
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone().unwrap_or_else(empty_object_schema),
        }
    }
}

impl std::fmt::Debug for FrontendTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontendTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .field("handler", &self.handler.as_ref().map(|_| "<fn>"))
            .field("follow_up", &self.follow_up)
            .field("agent_id", &self.agent_id)
            .finish()
    }
}
