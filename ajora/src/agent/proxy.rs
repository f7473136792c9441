//! Runtime-backed agent: each run is forwarded to the remote runtime over HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::agent::{Agent, AgentCore, RunAgentInput, RunAgentResult};
use crate::error::AgentError;
use crate::message::Message;
use crate::registry::RuntimeTransport;

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    #[serde(default)]
    messages: Vec<Message>,
}

/// Agent announced by a runtime. Holds no model logic of its own.
pub struct ProxiedAgent {
    core: AgentCore,
    runtime_url: String,
    transport: RuntimeTransport,
    client: reqwest::Client,
}

impl ProxiedAgent {
    pub fn new(
        agent_id: impl Into<String>,
        runtime_url: impl Into<String>,
        transport: RuntimeTransport,
        client: reqwest::Client,
    ) -> Self {
        Self {
            core: AgentCore::new().with_agent_id(agent_id),
            runtime_url: runtime_url.into(),
            transport,
            client,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.core = self.core.with_description(description);
        self
    }

    pub fn runtime_url(&self) -> &str {
        &self.runtime_url
    }

    pub fn transport(&self) -> RuntimeTransport {
        self.transport
    }

    fn request(&self, method: &str, body: Value) -> reqwest::RequestBuilder {
        let agent_id = self.core.agent_id().unwrap_or_default();
        let builder = match self.transport {
            RuntimeTransport::Rest => self
                .client
                .post(format!("{}/agent/{}/{}", self.runtime_url, agent_id, method))
                .json(&body),
            RuntimeTransport::Single => self.client.post(&self.runtime_url).json(&json!({
                "method": format!("agent/{method}"),
                "params": {"agentId": agent_id},
                "body": body,
            })),
        };
        self.core
            .headers()
            .into_iter()
            .fold(builder, |b, (name, value)| b.header(name, value))
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: Value,
    ) -> Result<T, AgentError> {
        let response = self
            .request(method, body)
            .send()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(AgentError::ExecutionFailed(format!(
                "runtime returned {}: {}",
                status.as_u16(),
                text
            )));
        }
        serde_json::from_str(&text).map_err(|e| AgentError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Agent for ProxiedAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn run(&self, input: RunAgentInput) -> Result<RunAgentResult, AgentError> {
        let token = self.core.begin_run(&input.run_id);
        debug!(agent_id = ?self.core.agent_id(), run_id = %input.run_id, "forwarding run to runtime");
        let body = match serde_json::to_value(&input) {
            Ok(body) => body,
            Err(e) => {
                let err = AgentError::Decode(e.to_string());
                self.core.fail_run(&err);
                return Err(err);
            }
        };

        let outcome = tokio::select! {
            _ = token.cancelled() => {
                self.core.finalize_run();
                return Err(AgentError::Aborted);
            }
            outcome = self.send::<RunAgentResult>("run", body) => outcome,
        };

        match outcome {
            Ok(result) => {
                self.core.add_messages(result.new_messages.clone());
                if !result.state.is_null() {
                    self.core.set_state(result.state.clone());
                }
                self.core.finalize_run();
                Ok(RunAgentResult {
                    new_messages: result.new_messages,
                    state: self.core.state(),
                })
            }
            Err(err) => {
                warn!(agent_id = ?self.core.agent_id(), error = %err, "remote run failed");
                self.core.fail_run(&err);
                Err(err)
            }
        }
    }

    async fn connect(&self) -> Result<(), AgentError> {
        let body = json!({"threadId": self.core.thread_id()});
        let response: ConnectResponse = self.send("connect", body).await?;
        debug!(
            agent_id = ?self.core.agent_id(),
            messages = response.messages.len(),
            "connected to remote thread"
        );
        self.core.set_messages(response.messages);
        Ok(())
    }

    fn clone_agent(&self) -> Arc<dyn Agent> {
        Arc::new(Self {
            core: self.core.fork(),
            runtime_url: self.runtime_url.clone(),
            transport: self.transport,
            client: self.client.clone(),
        })
    }
}
