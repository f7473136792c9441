//! Agent registry: dev-provided local agents plus agents announced by a remote runtime.
//!
//! Local agents are registered synchronously and override runtime agents with the same id.
//! Runtime discovery is asynchronous: [`AgentRegistry::connect_runtime`] moves the
//! connection status `Disconnected → Connecting → Connected | Error` and replaces the set of
//! runtime agents. A connection generation counter discards results of attempts superseded
//! by a newer URL or transport.

mod runtime;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::error::ErrorCode;
use crate::subscriber::{CoreEvent, SubscriberSet};
use crate::sync::{read, write};

pub use runtime::{
    normalize_runtime_url, HttpRuntimeClient, RemoteAgentInfo, RuntimeClient, RuntimeInfo,
    RuntimeTransport,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl RuntimeConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for RuntimeConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct AgentRegistry {
    local: RwLock<IndexMap<String, Arc<dyn Agent>>>,
    remote: RwLock<IndexMap<String, Arc<dyn Agent>>>,
    runtime_url: RwLock<Option<String>>,
    transport: RwLock<RuntimeTransport>,
    status: RwLock<RuntimeConnectionStatus>,
    version: RwLock<Option<String>>,
    generation: AtomicU64,
    headers: RwLock<BTreeMap<String, String>>,
    properties: RwLock<Map<String, Value>>,
    client: Arc<dyn RuntimeClient>,
    subscribers: Arc<SubscriberSet>,
}

impl AgentRegistry {
    pub fn new(subscribers: Arc<SubscriberSet>) -> Self {
        Self::with_client(subscribers, Arc::new(HttpRuntimeClient::new()))
    }

    pub fn with_client(subscribers: Arc<SubscriberSet>, client: Arc<dyn RuntimeClient>) -> Self {
        Self {
            local: RwLock::new(IndexMap::new()),
            remote: RwLock::new(IndexMap::new()),
            runtime_url: RwLock::new(None),
            transport: RwLock::new(RuntimeTransport::default()),
            status: RwLock::new(RuntimeConnectionStatus::Disconnected),
            version: RwLock::new(None),
            generation: AtomicU64::new(0),
            headers: RwLock::new(BTreeMap::new()),
            properties: RwLock::new(Map::new()),
            client,
            subscribers,
        }
    }

    /// Replaces every local agent and returns the previous ones.
    pub fn set_agents(
        &self,
        agents: IndexMap<String, Arc<dyn Agent>>,
    ) -> IndexMap<String, Arc<dyn Agent>> {
        for (id, agent) in &agents {
            self.prepare(id, agent.as_ref());
        }
        let previous = std::mem::replace(&mut *write(&self.local), agents);
        self.notify_agents_changed();
        previous
    }

    pub fn add_agent(&self, id: impl Into<String>, agent: Arc<dyn Agent>) {
        let id = id.into();
        self.prepare(&id, agent.as_ref());
        debug!(agent_id = %id, "local agent registered");
        write(&self.local).insert(id, agent);
        self.notify_agents_changed();
    }

    /// Removes a local agent; runtime agents are owned by discovery.
    pub fn remove_agent(&self, id: &str) -> bool {
        let removed = write(&self.local).shift_remove(id).is_some();
        if removed {
            debug!(agent_id = %id, "local agent removed");
            self.notify_agents_changed();
        }
        removed
    }

    /// `None` until the agent is registered or announced by the runtime.
    pub fn get_agent(&self, id: &str) -> Option<Arc<dyn Agent>> {
        if let Some(agent) = read(&self.local).get(id) {
            return Some(Arc::clone(agent));
        }
        read(&self.remote).get(id).cloned()
    }

    /// Local agents first, then runtime agents not shadowed by a local one.
    pub fn agents(&self) -> IndexMap<String, Arc<dyn Agent>> {
        let mut all = read(&self.local).clone();
        for (id, agent) in read(&self.remote).iter() {
            all.entry(id.clone()).or_insert_with(|| Arc::clone(agent));
        }
        all
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.agents().keys().cloned().collect()
    }

    pub fn runtime_url(&self) -> Option<String> {
        read(&self.runtime_url).clone()
    }

    pub fn runtime_transport(&self) -> RuntimeTransport {
        *read(&self.transport)
    }

    pub fn connection_status(&self) -> RuntimeConnectionStatus {
        *read(&self.status)
    }

    pub fn runtime_version(&self) -> Option<String> {
        read(&self.version).clone()
    }

    /// Stores the runtime settings without connecting.
    pub fn configure_runtime(&self, url: Option<&str>, transport: RuntimeTransport) {
        *write(&self.runtime_url) = url.and_then(normalize_runtime_url);
        *write(&self.transport) = transport;
    }

    /// Sets (or clears) the runtime URL and reconnects.
    pub async fn set_runtime_url(&self, url: Option<&str>) {
        let normalized = url.and_then(normalize_runtime_url);
        *write(&self.runtime_url) = normalized;
        self.connect_runtime().await;
    }

    pub async fn set_runtime_transport(&self, transport: RuntimeTransport) {
        *write(&self.transport) = transport;
        if self.runtime_url().is_some() {
            self.connect_runtime().await;
        }
    }

    /// Fetches the runtime's agent list and replaces the runtime agents. Failures are reported
    /// as `RUNTIME_INFO_FETCH_FAILED` and leave the registry with local agents only.
    pub async fn connect_runtime(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let Some(url) = self.runtime_url() else {
            *write(&self.version) = None;
            self.replace_remote(IndexMap::new());
            self.set_status(RuntimeConnectionStatus::Disconnected);
            return;
        };
        let transport = self.runtime_transport();
        let headers = read(&self.headers).clone();

        self.set_status(RuntimeConnectionStatus::Connecting);
        debug!(runtime_url = %url, transport = %transport, "fetching runtime info");
        let result = self.client.fetch_info(&url, transport, &headers).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(runtime_url = %url, "discarding superseded runtime connection attempt");
            return;
        }

        match result {
            Ok(info) => {
                let mut agents: IndexMap<String, Arc<dyn Agent>> = IndexMap::new();
                for (id, agent_info) in &info.agents {
                    let agent = self.client.create_agent(id, agent_info, &url, transport);
                    self.prepare(id, agent.as_ref());
                    agents.insert(id.clone(), agent);
                }
                info!(runtime_url = %url, agents = agents.len(), version = ?info.version, "runtime connected");
                *write(&self.version) = info.version;
                self.replace_remote(agents);
                self.set_status(RuntimeConnectionStatus::Connected);
            }
            Err(err) => {
                warn!(runtime_url = %url, error = %err, "runtime info fetch failed");
                *write(&self.version) = None;
                self.replace_remote(IndexMap::new());
                self.set_status(RuntimeConnectionStatus::Error);
                self.subscribers.emit_error(
                    ErrorCode::RuntimeInfoFetchFailed,
                    err.to_string(),
                    json!({"runtimeUrl": url}),
                );
            }
        }
    }

    /// Stores the headers and hands every registered agent its own copy.
    pub fn set_headers(&self, headers: BTreeMap<String, String>) {
        *write(&self.headers) = headers;
        for agent in self.agents().values() {
            agent.set_headers(read(&self.headers).clone());
        }
    }

    pub fn set_properties(&self, properties: Map<String, Value>) {
        *write(&self.properties) = properties;
        for agent in self.agents().values() {
            agent.set_properties(read(&self.properties).clone());
        }
    }

    fn prepare(&self, id: &str, agent: &dyn Agent) {
        if agent.agent_id().is_none() {
            agent.set_agent_id(id);
        }
        agent.set_headers(read(&self.headers).clone());
        agent.set_properties(read(&self.properties).clone());
    }

    fn replace_remote(&self, agents: IndexMap<String, Arc<dyn Agent>>) {
        let changed = {
            let mut remote = write(&self.remote);
            let changed = !(remote.is_empty() && agents.is_empty());
            *remote = agents;
            changed
        };
        if changed {
            self.notify_agents_changed();
        }
    }

    fn set_status(&self, status: RuntimeConnectionStatus) {
        let previous = std::mem::replace(&mut *write(&self.status), status);
        if previous != status {
            debug!(from = %previous, to = %status, "runtime connection status changed");
            self.subscribers
                .notify(&CoreEvent::RuntimeConnectionStatusChanged { status });
        }
    }

    fn notify_agents_changed(&self) {
        self.subscribers.notify(&CoreEvent::AgentsChanged {
            agent_ids: self.agent_ids(),
        });
    }
}
