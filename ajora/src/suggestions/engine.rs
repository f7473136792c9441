use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::agent::{Agent, RunAgentInput};
use crate::context::ContextStore;
use crate::message::Message;
use crate::registry::AgentRegistry;
use crate::subscriber::{CoreEvent, SubscriberSet};
use crate::suggestions::{
    parse_suggestions, suggestion_tool_definition, DynamicSuggestionsConfig, Suggestion,
    SuggestionsConfig, SuggestionsState, SUGGESTION_TOOL_NAME,
};
use crate::sync::{lock, read, write};

/// Load bookkeeping of one consumer agent.
#[derive(Default)]
struct LoadState {
    /// Bumped by every reload and clear; results carrying an older token are discarded.
    token: u64,
    in_flight: usize,
    clones: Vec<Arc<dyn Agent>>,
}

struct Inner {
    configs: RwLock<IndexMap<String, SuggestionsConfig>>,
    /// Per agent, one slot per applicable config in config order.
    suggestions: RwLock<HashMap<String, IndexMap<String, Vec<Suggestion>>>>,
    loads: Mutex<HashMap<String, LoadState>>,
    registry: Arc<AgentRegistry>,
    context: Arc<ContextStore>,
    subscribers: Arc<SubscriberSet>,
}

/// Computes and caches suggestions per consumer agent.
///
/// Dynamic configs run on a clone of their provider agent in a spawned task, so
/// [`reload_suggestions`](Self::reload_suggestions) returns immediately. Loading start and end
/// are edge-triggered on the number of in-flight generations for the agent.
#[derive(Clone)]
pub struct SuggestionEngine {
    inner: Arc<Inner>,
}

impl SuggestionEngine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        context: Arc<ContextStore>,
        subscribers: Arc<SubscriberSet>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                configs: RwLock::new(IndexMap::new()),
                suggestions: RwLock::new(HashMap::new()),
                loads: Mutex::new(HashMap::new()),
                registry,
                context,
                subscribers,
            }),
        }
    }

    /// Stores `config` under a fresh id and returns the id.
    pub fn add_config(&self, config: SuggestionsConfig) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        debug!(config_id = %id, consumer = %config.consumer_agent_id(), "suggestions config added");
        write(&self.inner.configs).insert(id.clone(), config);
        self.notify_configs();
        id
    }

    /// Removes the config. Suggestions already shown stay until the next reload or clear.
    pub fn remove_config(&self, id: &str) -> bool {
        let removed = write(&self.inner.configs).shift_remove(id).is_some();
        if removed {
            debug!(config_id = %id, "suggestions config removed");
            self.notify_configs();
        }
        removed
    }

    pub fn configs(&self) -> IndexMap<String, SuggestionsConfig> {
        read(&self.inner.configs).clone()
    }

    pub fn get_suggestions(&self, agent_id: &str) -> SuggestionsState {
        let is_loading = lock(&self.inner.loads)
            .get(agent_id)
            .map(|s| s.in_flight > 0)
            .unwrap_or(false);
        SuggestionsState {
            suggestions: self.inner.flattened(agent_id),
            is_loading,
        }
    }

    /// Recomputes the suggestions of `agent_id`. Fire-and-forget: failures end up as an empty
    /// list for the failing config.
    pub fn reload_suggestions(&self, agent_id: &str) {
        let inner = &self.inner;
        let Some(consumer) = inner.registry.get_agent(agent_id) else {
            debug!(agent_id = %agent_id, "reload_suggestions: consumer agent not found");
            return;
        };
        let messages = consumer.messages();
        let applicable: Vec<(String, SuggestionsConfig)> = read(&inner.configs)
            .iter()
            .filter(|(_, c)| c.applies_to(agent_id, messages.len()))
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect();
        let dynamic: Vec<(String, DynamicSuggestionsConfig)> = applicable
            .iter()
            .filter_map(|(id, c)| match c {
                SuggestionsConfig::Dynamic(d) => Some((id.clone(), d.clone())),
                SuggestionsConfig::Static(_) => None,
            })
            .collect();
        let runtime = tokio::runtime::Handle::try_current().ok();
        let spawnable = if runtime.is_some() { dynamic.len() } else { 0 };
        if runtime.is_none() && !dynamic.is_empty() {
            warn!(agent_id = %agent_id, "no tokio runtime; skipping dynamic suggestions");
        }

        let (token, stale, was_loading) = {
            let mut loads = lock(&inner.loads);
            let state = loads.entry(agent_id.to_string()).or_default();
            state.token += 1;
            let was_loading = state.in_flight > 0;
            state.in_flight = spawnable;
            (state.token, std::mem::take(&mut state.clones), was_loading)
        };
        for clone in stale {
            clone.abort_run();
        }

        let slots: IndexMap<String, Vec<Suggestion>> = applicable
            .iter()
            .map(|(id, c)| match c {
                SuggestionsConfig::Static(s) => (id.clone(), s.suggestions.clone()),
                SuggestionsConfig::Dynamic(_) => (id.clone(), Vec::new()),
            })
            .collect();
        write(&inner.suggestions).insert(agent_id.to_string(), slots);
        inner.notify_suggestions(agent_id);

        match (was_loading, spawnable > 0) {
            (false, true) => inner.subscribers.notify(&CoreEvent::SuggestionsStartedLoading {
                agent_id: agent_id.to_string(),
            }),
            (true, false) => inner.notify_finished(agent_id),
            _ => {}
        }

        let Some(runtime) = runtime else {
            return;
        };
        for (config_id, config) in dynamic {
            let inner = Arc::clone(inner);
            let agent_id = agent_id.to_string();
            let messages = messages.clone();
            runtime.spawn(async move {
                let suggestions = inner
                    .generate(&agent_id, &config, messages, token)
                    .await;
                inner.complete(&agent_id, &config_id, suggestions, token);
            });
        }
    }

    /// Aborts in-flight generation for `agent_id` and empties its list.
    pub fn clear_suggestions(&self, agent_id: &str) {
        let inner = &self.inner;
        let (clones, was_loading) = {
            let mut loads = lock(&inner.loads);
            let state = loads.entry(agent_id.to_string()).or_default();
            state.token += 1;
            let was_loading = state.in_flight > 0;
            state.in_flight = 0;
            (std::mem::take(&mut state.clones), was_loading)
        };
        for clone in clones {
            clone.abort_run();
        }
        write(&inner.suggestions).remove(agent_id);
        debug!(agent_id = %agent_id, aborted_load = was_loading, "suggestions cleared");
        inner.notify_suggestions(agent_id);
        if was_loading {
            inner.notify_finished(agent_id);
        }
    }

    fn notify_configs(&self) {
        self.inner
            .subscribers
            .notify(&CoreEvent::SuggestionsConfigChanged {
                configs: self.configs(),
            });
    }
}

impl Inner {
    fn flattened(&self, agent_id: &str) -> Vec<Suggestion> {
        read(&self.suggestions)
            .get(agent_id)
            .map(|slots| slots.values().flatten().cloned().collect())
            .unwrap_or_default()
    }

    fn is_current(&self, agent_id: &str, token: u64) -> bool {
        lock(&self.loads)
            .get(agent_id)
            .map(|s| s.token == token)
            .unwrap_or(false)
    }

    /// Runs one dynamic config on a clone of its provider.
    async fn generate(
        &self,
        agent_id: &str,
        config: &DynamicSuggestionsConfig,
        consumer_messages: Vec<Message>,
        token: u64,
    ) -> Vec<Suggestion> {
        let Some(provider) = self.registry.get_agent(&config.provider_agent_id) else {
            debug!(
                agent_id = %agent_id,
                provider = %config.provider_agent_id,
                "suggestion provider agent not found"
            );
            return Vec::new();
        };

        let clone = provider.clone_agent();
        let mut seeded = consumer_messages;
        seeded.push(Message::system(directive(config)));
        clone.set_messages(seeded);
        {
            let mut loads = lock(&self.loads);
            match loads.get_mut(agent_id) {
                Some(state) if state.token == token => state.clones.push(Arc::clone(&clone)),
                _ => return Vec::new(),
            }
        }

        let mut props = clone.core().properties();
        props.insert(
            "toolChoice".to_string(),
            json!({"type": "function", "function": {"name": SUGGESTION_TOOL_NAME}}),
        );
        let input = RunAgentInput {
            thread_id: clone.thread_id(),
            run_id: uuid::Uuid::new_v4().to_string(),
            messages: clone.messages(),
            tools: vec![suggestion_tool_definition(
                config.min_suggestions,
                config.max_suggestions,
            )],
            context: self.context.entries(),
            forwarded_props: Value::Object(props),
        };

        match clone.run(input).await {
            Ok(result) => {
                let suggestions = parse_suggestions(&result.new_messages, config.max_suggestions);
                if suggestions.len() < config.min_suggestions {
                    debug!(
                        agent_id = %agent_id,
                        got = suggestions.len(),
                        min = config.min_suggestions,
                        "provider returned fewer suggestions than requested"
                    );
                }
                suggestions
            }
            Err(err) => {
                debug!(agent_id = %agent_id, error = %err, "suggestion run did not complete");
                Vec::new()
            }
        }
    }

    /// Stores one config's result unless a reload or clear superseded it.
    fn complete(&self, agent_id: &str, config_id: &str, suggestions: Vec<Suggestion>, token: u64) {
        let finished = {
            let mut loads = lock(&self.loads);
            let Some(state) = loads.get_mut(agent_id) else {
                return;
            };
            if state.token != token {
                debug!(agent_id = %agent_id, config_id = %config_id, "discarding stale suggestions");
                return;
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.in_flight == 0 {
                state.clones.clear();
            }
            if let Some(slot) = write(&self.suggestions)
                .get_mut(agent_id)
                .and_then(|slots| slots.get_mut(config_id))
            {
                *slot = suggestions;
            }
            state.in_flight == 0
        };
        if self.is_current(agent_id, token) {
            self.notify_suggestions(agent_id);
        }
        if finished {
            self.notify_finished(agent_id);
        }
    }

    fn notify_suggestions(&self, agent_id: &str) {
        self.subscribers.notify(&CoreEvent::SuggestionsChanged {
            agent_id: agent_id.to_string(),
            suggestions: self.flattened(agent_id),
        });
    }

    fn notify_finished(&self, agent_id: &str) {
        self.subscribers
            .notify(&CoreEvent::SuggestionsFinishedLoading {
                agent_id: agent_id.to_string(),
            });
    }
}

fn directive(config: &DynamicSuggestionsConfig) -> String {
    format!(
        "Suggest what the user could say next. Reply only by calling the `{tool}` tool with \
         between {min} and {max} suggestions, each with a short title and the full message.\n\n\
         {instructions}",
        tool = SUGGESTION_TOOL_NAME,
        min = config.min_suggestions,
        max = config.max_suggestions,
        instructions = config.instructions,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{MockAgent, MockTurn};
    use crate::message::ToolCall;
    use crate::suggestions::StaticSuggestionsConfig;
    use std::time::Duration;

    fn engine_with(agents: Vec<(&str, MockAgent)>) -> SuggestionEngine {
        let subscribers = SubscriberSet::new();
        let registry = Arc::new(AgentRegistry::new(Arc::clone(&subscribers)));
        for (id, agent) in agents {
            registry.add_agent(id, Arc::new(agent));
        }
        let context = Arc::new(ContextStore::new(Arc::clone(&subscribers)));
        SuggestionEngine::new(registry, context, subscribers)
    }

    fn suggestion_turn(titles: &[&str]) -> MockTurn {
        let items: Vec<Value> = titles
            .iter()
            .map(|t| json!({"title": t, "message": format!("{t}!")}))
            .collect();
        MockTurn::tool_calls(vec![ToolCall::new(
            "s1",
            SUGGESTION_TOOL_NAME,
            json!({"suggestions": items}).to_string(),
        )])
    }

    /// **Scenario**: static configs are available synchronously, without a loading phase.
    #[test]
    fn static_suggestions_are_immediate() {
        let engine = engine_with(vec![("default", MockAgent::new())]);
        engine.add_config(
            StaticSuggestionsConfig::new(vec![Suggestion::new("Hi", "Hello there")]).into(),
        );
        engine.reload_suggestions("default");

        let state = engine.get_suggestions("default");
        assert!(!state.is_loading);
        assert_eq!(state.suggestions, vec![Suggestion::new("Hi", "Hello there")]);
    }

    /// **Scenario**: the provider clone receives the consumer's messages plus a directive,
    /// and the live provider is not touched.
    #[tokio::test]
    async fn dynamic_generation_uses_isolated_clone() {
        let provider = MockAgent::new()
            .with_messages(vec![Message::user("hello")])
            .with_turn(suggestion_turn(&["a", "b", "c", "d"]));
        let engine = engine_with(vec![("default", provider)]);
        engine.add_config(DynamicSuggestionsConfig::new("be brief").with_bounds(1, 2).into());

        engine.reload_suggestions("default");
        assert!(engine.get_suggestions("default").is_loading);
        for _ in 0..50 {
            if !engine.get_suggestions("default").is_loading {
                break;
            }
            tokio::task::yield_now().await;
        }

        let state = engine.get_suggestions("default");
        assert!(!state.is_loading);
        let titles: Vec<_> = state.suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);

        let live = engine.inner.registry.get_agent("default").unwrap();
        assert_eq!(live.messages().len(), 1);
    }

    /// **Scenario**: a reload supersedes the previous one; its late result is discarded.
    #[tokio::test(start_paused = true)]
    async fn reload_discards_stale_results() {
        let provider = MockAgent::new()
            .with_messages(vec![Message::user("hello")])
            .with_turns([
                suggestion_turn(&["old"]).with_delay(Duration::from_millis(100)),
                suggestion_turn(&["new"]).with_delay(Duration::from_millis(10)),
            ]);
        let engine = engine_with(vec![("default", provider)]);
        engine.add_config(DynamicSuggestionsConfig::new("x").into());

        engine.reload_suggestions("default");
        tokio::task::yield_now().await;
        engine.reload_suggestions("default");
        tokio::time::sleep(Duration::from_millis(200)).await;

        let state = engine.get_suggestions("default");
        assert!(!state.is_loading);
        let titles: Vec<_> = state.suggestions.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["new"]);
    }
}
