//! The tool-execution loop.
//!
//! [`RunHandler::run_agent`] runs the agent, executes the frontend tools its new messages ask
//! for (strictly one after another, in message order), appends one tool-result message per
//! executed call, and runs the agent again while any executed tool requests a follow-up. The
//! result of the last run is returned.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, trace};

use crate::agent::{Agent, AgentSubscriber, RunAgentInput, RunAgentResult, RunLifecycle};
use crate::context::ContextStore;
use crate::error::{AgentError, CoreError, ErrorCode};
use crate::message::{Message, ToolCall};
use crate::subscriber::{CoreEvent, SubscriberSet, ToolExecutionEndEvent, ToolExecutionStartEvent};
use crate::tools::{FrontendTool, ToolDefinition, ToolRegistry, WILDCARD_TOOL_NAME};

/// Arguments of [`RunHandler::run_agent`].
pub struct RunAgentOptions {
    pub agent: Arc<dyn Agent>,
    /// Appended to the agent's messages before the first run.
    pub with_messages: Vec<Message>,
}

impl RunAgentOptions {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self {
            agent,
            with_messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.with_messages = messages;
        self
    }
}

pub struct RunHandler {
    tools: ToolRegistry,
    context: Arc<ContextStore>,
    subscribers: Arc<SubscriberSet>,
}

impl RunHandler {
    pub fn new(context: Arc<ContextStore>, subscribers: Arc<SubscriberSet>) -> Self {
        Self {
            tools: ToolRegistry::new(),
            context,
            subscribers,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Tool definitions the model sees when `agent_id` runs.
    pub fn build_frontend_tools(&self, agent_id: Option<&str>) -> Vec<ToolDefinition> {
        self.tools.definitions_for(agent_id)
    }

    pub async fn run_agent(&self, options: RunAgentOptions) -> Result<RunAgentResult, CoreError> {
        let RunAgentOptions {
            agent,
            with_messages,
        } = options;
        for message in with_messages {
            agent.add_message(message);
        }

        let bridge = agent.subscribe(Arc::new(RunEventBridge {
            subscribers: Arc::clone(&self.subscribers),
        }));
        let outcome = self.run_loop(agent.as_ref()).await;
        bridge.unsubscribe();
        outcome
    }

    /// Re-attaches the agent to its thread; failure is `AGENT_CONNECT_FAILED`.
    pub async fn connect_agent(&self, agent: &dyn Agent) -> Result<(), CoreError> {
        agent.connect().await.map_err(|err| {
            self.subscribers.emit_error(
                ErrorCode::AgentConnectFailed,
                err.to_string(),
                json!({"agentId": agent.agent_id()}),
            );
            CoreError::AgentConnectFailed(err)
        })
    }

    /// Aborts the agent's in-flight run. Messages already appended stay.
    pub fn stop_agent(&self, agent: &dyn Agent) {
        debug!(agent_id = ?agent.agent_id(), "stopping agent");
        agent.abort_run();
    }

    async fn run_loop(&self, agent: &dyn Agent) -> Result<RunAgentResult, CoreError> {
        let mut runs = 0usize;
        loop {
            runs += 1;
            let input = self.build_input(agent);
            trace!(agent_id = ?agent.agent_id(), run_id = %input.run_id, runs, "starting agent run");

            let result = match agent.run(input).await {
                Ok(result) => result,
                Err(AgentError::Aborted) => {
                    debug!(agent_id = ?agent.agent_id(), runs, "agent run aborted");
                    return Ok(RunAgentResult {
                        new_messages: Vec::new(),
                        state: agent.state(),
                    });
                }
                Err(err) => {
                    self.subscribers.emit_error(
                        ErrorCode::AgentRunFailed,
                        err.to_string(),
                        json!({"agentId": agent.agent_id()}),
                    );
                    return Err(CoreError::AgentRunFailed(err));
                }
            };

            if !self.execute_tool_calls(agent, &result.new_messages).await? {
                debug!(agent_id = ?agent.agent_id(), runs, "run loop finished");
                return Ok(result);
            }
        }
    }

    fn build_input(&self, agent: &dyn Agent) -> RunAgentInput {
        let agent_id = agent.agent_id();
        RunAgentInput {
            thread_id: agent.thread_id(),
            run_id: uuid::Uuid::new_v4().to_string(),
            messages: agent.messages(),
            tools: self.build_frontend_tools(agent_id.as_deref()),
            context: self.context.entries(),
            forwarded_props: Value::Object(agent.core().properties()),
        }
    }

    /// Executes every resolvable call in `messages`; returns whether a follow-up run is due.
    async fn execute_tool_calls(
        &self,
        agent: &dyn Agent,
        messages: &[Message],
    ) -> Result<bool, CoreError> {
        let agent_id = agent.agent_id();
        let mut follow_up = false;

        for call in messages.iter().flat_map(|m| m.tool_calls()) {
            let Some((tool, wildcard)) = self.resolve(call.name(), agent_id.as_deref()) else {
                debug!(tool = %call.name(), tool_call_id = %call.id, "no tool registered, dropping call");
                continue;
            };
            let Some(handler) = tool.handler.clone() else {
                debug!(tool = %call.name(), tool_call_id = %call.id, "tool has no handler, skipping");
                continue;
            };

            let args = self.parse_arguments(call, agent_id.as_deref())?;
            let handler_args = if wildcard {
                json!({"toolName": call.name(), "args": args})
            } else {
                args.clone()
            };

            let agent_label = agent_id.clone().unwrap_or_default();
            self.subscribers
                .notify(&CoreEvent::ToolExecutionStart(ToolExecutionStartEvent {
                    tool_call_id: call.id.clone(),
                    agent_id: agent_label.clone(),
                    tool_name: call.name().to_string(),
                    args,
                }));

            let (content, error) = match handler.call(handler_args, call).await {
                Ok(value) => (stringify_result(value), None),
                Err(err) => {
                    self.subscribers.emit_error(
                        ErrorCode::ToolHandlerFailed,
                        err.to_string(),
                        json!({
                            "agentId": agent_id,
                            "toolName": call.name(),
                            "toolCallId": call.id,
                        }),
                    );
                    (format!("Error: {err}"), Some(err.to_string()))
                }
            };

            self.subscribers
                .notify(&CoreEvent::ToolExecutionEnd(ToolExecutionEndEvent {
                    tool_call_id: call.id.clone(),
                    agent_id: agent_label,
                    tool_name: call.name().to_string(),
                    result: content.clone(),
                    error: error.clone(),
                }));

            agent.add_message(Message::Tool {
                id: uuid::Uuid::new_v4().to_string(),
                content,
                tool_call_id: call.id.clone(),
                error,
            });
            follow_up |= tool.follow_up;
        }
        Ok(follow_up)
    }

    /// The named tool, else the wildcard tool (flagged `true`).
    fn resolve(&self, name: &str, agent_id: Option<&str>) -> Option<(FrontendTool, bool)> {
        if let Some(tool) = self.tools.get(name, agent_id) {
            return Some((tool, false));
        }
        self.tools
            .get(WILDCARD_TOOL_NAME, agent_id)
            .map(|tool| (tool, true))
    }

    fn parse_arguments(&self, call: &ToolCall, agent_id: Option<&str>) -> Result<Value, CoreError> {
        let raw = call.function.arguments.trim();
        if raw.is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(raw).map_err(|source| {
            self.subscribers.emit_error(
                ErrorCode::ToolArgumentParseFailed,
                source.to_string(),
                json!({
                    "agentId": agent_id,
                    "toolName": call.name(),
                    "toolCallId": call.id,
                }),
            );
            CoreError::ToolArgumentParse {
                tool_name: call.name().to_string(),
                tool_call_id: call.id.clone(),
                source,
            }
        })
    }
}

/// Tool-result message content: strings verbatim, `null` empty, anything else as JSON.
fn stringify_result(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Surfaces the agent's own failure and error events on the core error channel while a run
/// is driven by the handler.
struct RunEventBridge {
    subscribers: Arc<SubscriberSet>,
}

impl AgentSubscriber for RunEventBridge {
    fn on_run_failed(&self, run: &RunLifecycle, error: &AgentError) {
        self.subscribers.emit_error(
            ErrorCode::AgentRunFailedEvent,
            error.to_string(),
            json!({"agentId": run.agent_id, "threadId": run.thread_id, "runId": run.run_id}),
        );
    }

    fn on_run_error_event(&self, run: &RunLifecycle, message: &str, code: Option<&str>) {
        self.subscribers.emit_error(
            ErrorCode::AgentRunErrorEvent,
            message,
            json!({
                "agentId": run.agent_id,
                "threadId": run.thread_id,
                "runId": run.run_id,
                "code": code,
            }),
        );
    }
}
