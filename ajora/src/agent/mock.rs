//! Scripted agent for tests and demos.
//!
//! Each call to `run` consumes the next [`MockTurn`] from a script shared with every clone of
//! the agent (so a suggestion clone and the live agent pull from the same queue). When the
//! script is empty the fallback turn is replayed, or an empty turn when none is set.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::{Agent, AgentCore, RunAgentInput, RunAgentResult};
use crate::error::AgentError;
use crate::message::{Message, ToolCall};
use crate::sync::lock;

/// One scripted reply.
#[derive(Debug, Clone, Default)]
pub struct MockTurn {
    pub messages: Vec<Message>,
    /// Simulated latency; an abort during the delay ends the run with [`AgentError::Aborted`].
    pub delay: Option<Duration>,
    /// Makes the run reject with [`AgentError::ExecutionFailed`].
    pub failure: Option<String>,
    pub state: Option<Value>,
    /// Run-level error event `(message, code)` reported before the turn settles.
    pub error_event: Option<(String, Option<String>)>,
}

impl MockTurn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain assistant text reply.
    pub fn reply(text: impl Into<String>) -> Self {
        Self::new().with_message(Message::assistant(text))
    }

    /// Assistant message requesting `calls`.
    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::new().with_message(Message::assistant_with_tool_calls(None, calls))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_error_event(mut self, message: impl Into<String>, code: Option<&str>) -> Self {
        self.error_event = Some((message.into(), code.map(str::to_string)));
        self
    }
}

pub struct MockAgent {
    core: AgentCore,
    script: Arc<Mutex<VecDeque<MockTurn>>>,
    fallback: Option<MockTurn>,
    run_count: Arc<AtomicUsize>,
    inputs: Arc<Mutex<Vec<RunAgentInput>>>,
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            core: AgentCore::new(),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: None,
            run_count: Arc::new(AtomicUsize::new(0)),
            inputs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_agent_id(mut self, id: impl Into<String>) -> Self {
        self.core = self.core.with_agent_id(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.core = self.core.with_description(description);
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.core = self.core.with_messages(messages);
        self
    }

    pub fn with_turn(self, turn: MockTurn) -> Self {
        self.push_turn(turn);
        self
    }

    pub fn with_turns(self, turns: impl IntoIterator<Item = MockTurn>) -> Self {
        lock(&self.script).extend(turns);
        self
    }

    /// Turn replayed whenever the script is exhausted.
    pub fn with_fallback(mut self, turn: MockTurn) -> Self {
        self.fallback = Some(turn);
        self
    }

    pub fn push_turn(&self, turn: MockTurn) {
        lock(&self.script).push_back(turn);
    }

    /// Runs started on this agent and all of its clones.
    pub fn run_count(&self) -> usize {
        self.run_count.load(Ordering::SeqCst)
    }

    /// Inputs received by this agent and all of its clones, in start order.
    pub fn inputs(&self) -> Vec<RunAgentInput> {
        lock(&self.inputs).clone()
    }

    fn next_turn(&self) -> MockTurn {
        lock(&self.script)
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_default()
    }

    /// Gives replayed messages fresh ids so every id stays unique in the agent's list.
    fn with_unique_ids(&self, messages: Vec<Message>) -> Vec<Message> {
        let mut seen: HashSet<String> = self
            .core
            .messages()
            .iter()
            .map(|m| m.id().to_string())
            .collect();
        messages
            .into_iter()
            .map(|m| {
                let m = if seen.contains(m.id()) {
                    m.with_id(uuid::Uuid::new_v4().to_string())
                } else {
                    m
                };
                seen.insert(m.id().to_string());
                m
            })
            .collect()
    }
}

#[async_trait]
impl Agent for MockAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn run(&self, input: RunAgentInput) -> Result<RunAgentResult, AgentError> {
        let token = self.core.begin_run(&input.run_id);
        self.run_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.inputs).push(input);
        let turn = self.next_turn();

        if let Some(delay) = turn.delay {
            tokio::select! {
                _ = token.cancelled() => {
                    self.core.finalize_run();
                    return Err(AgentError::Aborted);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        } else if token.is_cancelled() {
            self.core.finalize_run();
            return Err(AgentError::Aborted);
        }

        if let Some((message, code)) = &turn.error_event {
            self.core.report_run_error(message, code.as_deref());
        }

        if let Some(failure) = turn.failure {
            let err = AgentError::ExecutionFailed(failure);
            self.core.fail_run(&err);
            return Err(err);
        }

        let new_messages = self.with_unique_ids(turn.messages);
        self.core.add_messages(new_messages.clone());
        if let Some(state) = turn.state {
            self.core.set_state(state);
        }
        self.core.finalize_run();

        Ok(RunAgentResult {
            new_messages,
            state: self.core.state(),
        })
    }

    fn clone_agent(&self) -> Arc<dyn Agent> {
        Arc::new(Self {
            core: self.core.fork(),
            script: Arc::clone(&self.script),
            fallback: self.fallback.clone(),
            run_count: Arc::clone(&self.run_count),
            inputs: Arc::clone(&self.inputs),
        })
    }
}
