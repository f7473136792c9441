//! [`AjoraCore`]: the façade composing the registry, run handler, suggestion engine, context
//! store and state manager around one subscriber set.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::agent::{Agent, RunAgentResult};
use crate::context::{ContextEntry, ContextStore};
use crate::error::{ConfigError, CoreError};
use crate::message::Message;
use crate::registry::{
    AgentRegistry, HttpRuntimeClient, RuntimeClient, RuntimeConnectionStatus, RuntimeTransport,
};
use crate::run_handler::{RunAgentOptions, RunHandler};
use crate::state_manager::StateManager;
use crate::subscriber::{CoreEvent, CoreSubscriber, SubscriberSet, Subscription};
use crate::suggestions::{SuggestionEngine, SuggestionsConfig, SuggestionsState};
use crate::sync::{read, write};
use crate::tools::FrontendTool;

pub const RUNTIME_URL_ENV: &str = "AJORA_RUNTIME_URL";
pub const RUNTIME_TRANSPORT_ENV: &str = "AJORA_RUNTIME_TRANSPORT";

/// Construction-time settings of an [`AjoraCore`].
#[derive(Clone, Default)]
pub struct CoreConfig {
    pub runtime_url: Option<String>,
    pub runtime_transport: RuntimeTransport,
    pub headers: BTreeMap<String, String>,
    pub properties: Map<String, Value>,
    /// Dev-only local agents, keyed by id.
    pub agents: IndexMap<String, Arc<dyn Agent>>,
    pub tools: Vec<FrontendTool>,
    pub suggestions_config: Vec<SuggestionsConfig>,
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `.env` and `$XDG_CONFIG_HOME/ajora/config.toml` to the process environment,
    /// then reads `AJORA_RUNTIME_URL` and `AJORA_RUNTIME_TRANSPORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let applied = env_config::load_and_apply("ajora", None)?;
        if !applied.is_empty() {
            debug!(keys = ?applied, "applied config from .env / config.toml");
        }
        let runtime_transport = match env_config::env_value(RUNTIME_TRANSPORT_ENV) {
            Some(raw) => raw.parse().map_err(ConfigError::Transport)?,
            None => RuntimeTransport::default(),
        };
        Ok(Self {
            runtime_url: env_config::env_value(RUNTIME_URL_ENV),
            runtime_transport,
            ..Self::default()
        })
    }

    pub fn with_runtime_url(mut self, url: impl Into<String>) -> Self {
        self.runtime_url = Some(url.into());
        self
    }

    pub fn with_runtime_transport(mut self, transport: RuntimeTransport) -> Self {
        self.runtime_transport = transport;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_agent(mut self, id: impl Into<String>, agent: Arc<dyn Agent>) -> Self {
        self.agents.insert(id.into(), agent);
        self
    }

    pub fn with_tool(mut self, tool: FrontendTool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_suggestions_config(mut self, config: impl Into<SuggestionsConfig>) -> Self {
        self.suggestions_config.push(config.into());
        self
    }
}

pub struct AjoraCore {
    id: String,
    subscribers: Arc<SubscriberSet>,
    context: Arc<ContextStore>,
    registry: Arc<AgentRegistry>,
    run_handler: RunHandler,
    suggestions: SuggestionEngine,
    state: StateManager,
    headers: RwLock<BTreeMap<String, String>>,
    properties: RwLock<Map<String, Value>>,
}

impl AjoraCore {
    /// Builds the core. A configured runtime is connected in the background when a tokio
    /// runtime is available; otherwise call [`connect_runtime`](Self::connect_runtime).
    pub fn new(config: CoreConfig) -> Self {
        Self::with_runtime_client(config, Arc::new(HttpRuntimeClient::new()))
    }

    pub fn with_runtime_client(config: CoreConfig, client: Arc<dyn RuntimeClient>) -> Self {
        let subscribers = SubscriberSet::new();
        let context = Arc::new(ContextStore::new(Arc::clone(&subscribers)));
        let registry = Arc::new(AgentRegistry::with_client(Arc::clone(&subscribers), client));
        registry.configure_runtime(config.runtime_url.as_deref(), config.runtime_transport);
        registry.set_headers(config.headers.clone());
        registry.set_properties(config.properties.clone());
        let state = StateManager::new();
        for (id, agent) in &config.agents {
            state.track_agent(id, agent);
        }
        registry.set_agents(config.agents);

        let run_handler = RunHandler::new(Arc::clone(&context), Arc::clone(&subscribers));
        run_handler.tools().set(config.tools);

        let suggestions = SuggestionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&context),
            Arc::clone(&subscribers),
        );
        for suggestions_config in config.suggestions_config {
            suggestions.add_config(suggestions_config);
        }

        let id = uuid::Uuid::new_v4().to_string();
        info!(core_id = %id, runtime_url = ?registry.runtime_url(), "core created");
        if let Some(url) = registry.runtime_url() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let registry = Arc::clone(&registry);
                    handle.spawn(async move { registry.connect_runtime().await });
                }
                Err(_) => warn!(
                    runtime_url = %url,
                    "no tokio runtime; call connect_runtime to discover agents"
                ),
            }
        }
        Self {
            id,
            subscribers,
            context,
            registry,
            run_handler,
            suggestions,
            state,
            headers: RwLock::new(config.headers),
            properties: RwLock::new(config.properties),
        }
    }

    /// Identifies this core in protocol envelopes.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subscribe(&self, subscriber: Arc<dyn CoreSubscriber>) -> Subscription {
        self.subscribers.subscribe(subscriber)
    }

    // Agents

    pub fn get_agent(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.registry.get_agent(id)
    }

    pub fn agents(&self) -> IndexMap<String, Arc<dyn Agent>> {
        self.registry.agents()
    }

    /// Replaces the local agents. Replaced agents stop being indexed.
    pub fn set_agents(&self, agents: IndexMap<String, Arc<dyn Agent>>) {
        for (id, agent) in &agents {
            self.state.track_agent(id, agent);
        }
        let kept: Vec<String> = agents.keys().cloned().collect();
        for id in self.registry.set_agents(agents).into_keys() {
            if !kept.contains(&id) {
                self.state.untrack_agent(&id);
            }
        }
    }

    pub fn add_agent(&self, id: impl Into<String>, agent: Arc<dyn Agent>) {
        let id = id.into();
        self.state.track_agent(&id, &agent);
        self.registry.add_agent(id, agent);
    }

    pub fn remove_agent(&self, id: &str) -> bool {
        let removed = self.registry.remove_agent(id);
        if removed {
            self.state.untrack_agent(id);
        }
        removed
    }

    /// Runs the agent through the tool loop and returns the result of its last run.
    pub async fn run_agent(&self, options: RunAgentOptions) -> Result<RunAgentResult, CoreError> {
        self.track(&options.agent);
        self.run_handler.run_agent(options).await
    }

    /// Looks the agent up by id and runs it; unknown ids are a setup error.
    pub async fn run_agent_by_id(
        &self,
        agent_id: &str,
        with_messages: Vec<Message>,
    ) -> Result<RunAgentResult, CoreError> {
        let agent = self
            .get_agent(agent_id)
            .ok_or_else(|| CoreError::AgentNotFound(agent_id.to_string()))?;
        self.run_agent(RunAgentOptions::new(agent).with_messages(with_messages))
            .await
    }

    pub async fn connect_agent(&self, agent: &Arc<dyn Agent>) -> Result<(), CoreError> {
        self.track(agent);
        self.run_handler.connect_agent(agent.as_ref()).await
    }

    pub fn stop_agent(&self, agent: &dyn Agent) {
        self.run_handler.stop_agent(agent);
    }

    fn track(&self, agent: &Arc<dyn Agent>) {
        if let Some(agent_id) = agent.agent_id() {
            self.state.track_agent(&agent_id, agent);
        }
    }

    // Tools

    pub fn add_tool(&self, tool: FrontendTool) -> bool {
        self.run_handler.tools().add(tool)
    }

    pub fn remove_tool(&self, name: &str, agent_id: Option<&str>) -> bool {
        self.run_handler.tools().remove(name, agent_id)
    }

    pub fn get_tool(&self, name: &str, agent_id: Option<&str>) -> Option<FrontendTool> {
        self.run_handler.tools().get(name, agent_id)
    }

    pub fn set_tools(&self, tools: Vec<FrontendTool>) {
        self.run_handler.tools().set(tools);
    }

    pub fn tools(&self) -> Vec<FrontendTool> {
        self.run_handler.tools().list()
    }

    // Context

    pub fn add_context(&self, description: impl Into<String>, value: impl Into<String>) -> String {
        self.context.add(ContextEntry::new(description, value))
    }

    pub fn remove_context(&self, id: &str) -> bool {
        self.context.remove(id)
    }

    pub fn context(&self) -> IndexMap<String, ContextEntry> {
        self.context.snapshot()
    }

    // Suggestions

    pub fn add_suggestions_config(&self, config: impl Into<SuggestionsConfig>) -> String {
        self.suggestions.add_config(config.into())
    }

    pub fn remove_suggestions_config(&self, id: &str) -> bool {
        self.suggestions.remove_config(id)
    }

    pub fn suggestions_config(&self) -> IndexMap<String, SuggestionsConfig> {
        self.suggestions.configs()
    }

    pub fn reload_suggestions(&self, agent_id: &str) {
        self.suggestions.reload_suggestions(agent_id);
    }

    pub fn clear_suggestions(&self, agent_id: &str) {
        self.suggestions.clear_suggestions(agent_id);
    }

    pub fn get_suggestions(&self, agent_id: &str) -> SuggestionsState {
        self.suggestions.get_suggestions(agent_id)
    }

    // Headers and properties

    /// Replaces the request headers; every registered agent receives its own copy.
    pub fn set_headers(&self, headers: BTreeMap<String, String>) {
        *write(&self.headers) = headers.clone();
        self.registry.set_headers(headers.clone());
        self.subscribers
            .notify(&CoreEvent::HeadersChanged { headers });
    }

    pub fn headers(&self) -> BTreeMap<String, String> {
        read(&self.headers).clone()
    }

    /// Replaces the properties forwarded with every run.
    pub fn set_properties(&self, properties: Map<String, Value>) {
        *write(&self.properties) = properties.clone();
        self.registry.set_properties(properties.clone());
        self.subscribers
            .notify(&CoreEvent::PropertiesChanged { properties });
    }

    pub fn properties(&self) -> Map<String, Value> {
        read(&self.properties).clone()
    }

    // Runtime

    pub async fn connect_runtime(&self) {
        self.registry.connect_runtime().await;
    }

    pub async fn set_runtime_url(&self, url: Option<&str>) {
        self.registry.set_runtime_url(url).await;
    }

    pub async fn set_runtime_transport(&self, transport: RuntimeTransport) {
        self.registry.set_runtime_transport(transport).await;
    }

    pub fn runtime_url(&self) -> Option<String> {
        self.registry.runtime_url()
    }

    pub fn runtime_transport(&self) -> RuntimeTransport {
        self.registry.runtime_transport()
    }

    pub fn runtime_connection_status(&self) -> RuntimeConnectionStatus {
        self.registry.connection_status()
    }

    pub fn runtime_version(&self) -> Option<String> {
        self.registry.runtime_version()
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state
    }
}
