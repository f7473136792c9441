//! Runtime discovery: the wire calls that announce a runtime's agents.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::{Agent, ProxiedAgent};
use crate::error::RuntimeError;

/// How requests are addressed to the runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeTransport {
    /// One endpoint per operation (`GET {url}/info`, `POST {url}/agent/{id}/run`).
    #[default]
    Rest,
    /// Every call is a `POST {url}` whose body names the method.
    Single,
}

impl RuntimeTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Single => "single",
        }
    }
}

impl FromStr for RuntimeTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(Self::Rest),
            "single" => Ok(Self::Single),
            other => Err(format!("unknown runtime transport: {other}")),
        }
    }
}

impl std::fmt::Display for RuntimeTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAgentInfo {
    #[serde(default)]
    pub description: Option<String>,
}

/// Response of the runtime's `info` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub agents: BTreeMap<String, RemoteAgentInfo>,
}

/// Seam between the registry and the network.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    async fn fetch_info(
        &self,
        url: &str,
        transport: RuntimeTransport,
        headers: &BTreeMap<String, String>,
    ) -> Result<RuntimeInfo, RuntimeError>;

    /// Builds the proxy for one announced agent.
    fn create_agent(
        &self,
        agent_id: &str,
        info: &RemoteAgentInfo,
        url: &str,
        transport: RuntimeTransport,
    ) -> Arc<dyn Agent>;
}

/// [`RuntimeClient`] over `reqwest`; agents it creates are [`ProxiedAgent`]s sharing its
/// connection pool.
#[derive(Debug, Clone, Default)]
pub struct HttpRuntimeClient {
    client: reqwest::Client,
}

impl HttpRuntimeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RuntimeClient for HttpRuntimeClient {
    async fn fetch_info(
        &self,
        url: &str,
        transport: RuntimeTransport,
        headers: &BTreeMap<String, String>,
    ) -> Result<RuntimeInfo, RuntimeError> {
        let request = match transport {
            RuntimeTransport::Rest => self.client.get(format!("{url}/info")),
            RuntimeTransport::Single => self.client.post(url).json(&json!({"method": "info"})),
        };
        let request = headers
            .iter()
            .fold(request, |r, (name, value)| r.header(name, value));
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RuntimeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    fn create_agent(
        &self,
        agent_id: &str,
        info: &RemoteAgentInfo,
        url: &str,
        transport: RuntimeTransport,
    ) -> Arc<dyn Agent> {
        let agent = ProxiedAgent::new(agent_id, url, transport, self.client.clone());
        match &info.description {
            Some(description) => Arc::new(agent.with_description(description)),
            None => Arc::new(agent),
        }
    }
}

/// Trims trailing slashes; a blank URL means "no runtime".
pub fn normalize_runtime_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
