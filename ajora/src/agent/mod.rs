//! Agent capability interface.
//!
//! An [`Agent`] is an externally supplied unit of conversational state: an ordered message
//! list, a thread id, a running flag and an opaque state object, plus an asynchronous,
//! cancelable [`Agent::run`]. The core never inspects how an agent produces messages; it only
//! drives runs, appends tool results, and listens to lifecycle events through
//! [`AgentSubscriber`].
//!
//! Implementations embed an [`AgentCore`] (returned from [`Agent::core`]), which provides the
//! shared state and lifecycle notification; every state accessor on the trait defaults to it.
//!
//! # Provided implementations
//!
//! - [`MockAgent`]: scripted turns for tests and examples.
//! - [`ProxiedAgent`]: forwards runs to a remote runtime over HTTP.

mod shared;
mod mock;
mod proxy;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::ContextEntry;
use crate::error::AgentError;
use crate::message::Message;
use crate::tools::ToolDefinition;

pub use shared::{AgentCore, AgentSubscription};
pub use mock::{MockAgent, MockTurn};
pub use proxy::ProxiedAgent;

/// Everything an agent receives for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentInput {
    pub thread_id: String,
    pub run_id: String,
    /// The agent's messages at the time the run was started.
    pub messages: Vec<Message>,
    /// Frontend tools the model may call.
    pub tools: Vec<ToolDefinition>,
    /// Grounding context entries.
    pub context: Vec<ContextEntry>,
    /// Core properties forwarded verbatim (plus run-specific hints such as `toolChoice`).
    pub forwarded_props: Value,
}

/// Outcome of one run: the messages it appended, and the agent state afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAgentResult {
    #[serde(default)]
    pub new_messages: Vec<Message>,
    #[serde(default)]
    pub state: Value,
}

/// Identifies one run in lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLifecycle {
    pub agent_id: Option<String>,
    pub thread_id: String,
    pub run_id: String,
}

/// Listener for one agent's changes. All handlers are optional.
pub trait AgentSubscriber: Send + Sync {
    fn on_messages_changed(&self, _messages: &[Message]) {}
    fn on_state_changed(&self, _state: &Value) {}
    fn on_run_initialized(&self, _run: &RunLifecycle) {}
    /// Fired before `run` returns, with the agent's full message list and state.
    fn on_run_finalized(&self, _run: &RunLifecycle, _messages: &[Message], _state: &Value) {}
    fn on_run_failed(&self, _run: &RunLifecycle, _error: &AgentError) {}
    /// A run-level error event reported by the agent's event stream (the run may still settle).
    fn on_run_error_event(&self, _run: &RunLifecycle, _message: &str, _code: Option<&str>) {}
}

#[async_trait]
pub trait Agent: Send + Sync {
    /// Shared state backing the default accessors below.
    fn core(&self) -> &AgentCore;

    /// Executes one run. Implementations append produced messages to their own list, fire
    /// lifecycle events through [`AgentCore`], and return the newly produced messages.
    /// An aborted run returns [`AgentError::Aborted`].
    async fn run(&self, input: RunAgentInput) -> Result<RunAgentResult, AgentError>;

    /// Fresh agent with the same behavior and a by-value copy of the messages, thread id and
    /// state. Subscribers and in-flight runs are not shared.
    fn clone_agent(&self) -> Arc<dyn Agent>;

    /// Re-attaches to an existing thread (e.g. loads remote history). Local agents have nothing to do.
    async fn connect(&self) -> Result<(), AgentError> {
        Ok(())
    }

    fn agent_id(&self) -> Option<String> {
        self.core().agent_id()
    }

    fn set_agent_id(&self, id: &str) {
        self.core().set_agent_id(id)
    }

    fn description(&self) -> Option<String> {
        self.core().description()
    }

    fn thread_id(&self) -> String {
        self.core().thread_id()
    }

    fn messages(&self) -> Vec<Message> {
        self.core().messages()
    }

    fn set_messages(&self, messages: Vec<Message>) {
        self.core().set_messages(messages)
    }

    fn add_message(&self, message: Message) {
        self.core().add_message(message)
    }

    fn state(&self) -> Value {
        self.core().state()
    }

    fn is_running(&self) -> bool {
        self.core().is_running()
    }

    /// Cancels the in-flight run, if any. Messages already appended stay.
    fn abort_run(&self) {
        self.core().abort()
    }

    fn subscribe(&self, subscriber: Arc<dyn AgentSubscriber>) -> AgentSubscription {
        self.core().subscribe(subscriber)
    }

    fn set_headers(&self, headers: BTreeMap<String, String>) {
        self.core().set_headers(headers)
    }

    fn set_properties(&self, properties: Map<String, Value>) {
        self.core().set_properties(properties)
    }
}
