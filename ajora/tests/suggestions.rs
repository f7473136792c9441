//! Integration tests for suggestion generation through `AjoraCore`.
//!
//! Providers are `MockAgent`s answering with an `ajoraSuggestion` tool call; time is paused
//! so delayed providers can be observed mid-flight.


use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ajora::suggestions::SUGGESTION_TOOL_NAME;
use ajora::{
    Agent, AjoraCore, ContextEntry, CoreConfig, CoreSubscriber, DynamicSuggestionsConfig, Message,
    MockAgent, MockTurn, StaticSuggestionsConfig, Suggestion, SuggestionAvailability,
    SuggestionsConfig, SuggestionsState, ToolCall,
};
use indexmap::IndexMap;
use serde_json::json;

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    finished: AtomicUsize,
    config_payloads: Mutex<Vec<IndexMap<String, SuggestionsConfig>>>,
    changes: Mutex<Vec<Vec<Suggestion>>>,
}

impl CoreSubscriber for Recorder {
    fn on_suggestions_started_loading(&self, _agent_id: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_suggestions_finished_loading(&self, _agent_id: &str) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
    fn on_suggestions_config_changed(&self, configs: &IndexMap<String, SuggestionsConfig>) {
        self.config_payloads.lock().unwrap().push(configs.clone());
    }
    fn on_suggestions_changed(&self, _agent_id: &str, suggestions: &[Suggestion]) {
        self.changes.lock().unwrap().push(suggestions.to_vec());
    }
}

fn suggestion_turn(titles: &[&str]) -> MockTurn {
    let items: Vec<_> = titles
        .iter()
        .map(|t| json!({"title": t, "message": format!("Tell me about {t}")}))
        .collect();
    MockTurn::tool_calls(vec![ToolCall::new(
        "s1",
        SUGGESTION_TOOL_NAME,
        json!({"suggestions": items}).to_string(),
    )])
}

fn conversation_agent(turn: MockTurn) -> Arc<MockAgent> {
    Arc::new(
        MockAgent::new()
            .with_messages(vec![Message::user("hello"), Message::assistant("hi there")])
            .with_fallback(turn),
    )
}

fn setup(agent: &Arc<MockAgent>) -> (AjoraCore, Arc<Recorder>) {
    let core = AjoraCore::new(CoreConfig::new().with_agent("default", agent.clone()));
    let recorder = Arc::new(Recorder::default());
    let _subscription = core.subscribe(recorder.clone());
    (core, recorder)
}

fn titles(state: &SuggestionsState) -> Vec<String> {
    state.suggestions.iter().map(|s| s.title.clone()).collect()
}

/// **Scenario**: two dynamic configs under one reload fire loading start and end once each.
#[tokio::test(start_paused = true)]
async fn loading_events_fire_once_across_configs() {
    let agent = conversation_agent(
        suggestion_turn(&["weather", "news"]).with_delay(Duration::from_millis(20)),
    );
    let (core, recorder) = setup(&agent);
    core.add_suggestions_config(DynamicSuggestionsConfig::new("topics"));
    core.add_suggestions_config(DynamicSuggestionsConfig::new("more topics").with_bounds(1, 1));

    core.reload_suggestions("default");
    assert!(core.get_suggestions("default").is_loading);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    let state = core.get_suggestions("default");
    assert!(!state.is_loading);
    assert_eq!(titles(&state), vec!["weather", "news", "weather"]);
    assert_eq!(agent.messages().len(), 2, "live agent must not be touched");
    assert_eq!(agent.run_count(), 2);
}

/// **Scenario**: clearing during generation empties the list immediately and a late result
/// never shows up.
#[tokio::test(start_paused = true)]
async fn clear_aborts_in_flight_generation() {
    let agent =
        conversation_agent(suggestion_turn(&["late"]).with_delay(Duration::from_secs(5)));
    let (core, recorder) = setup(&agent);
    core.add_suggestions_config(DynamicSuggestionsConfig::new("topics"));

    core.reload_suggestions("default");
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(core.get_suggestions("default").is_loading);

    core.clear_suggestions("default");
    assert_eq!(core.get_suggestions("default"), SuggestionsState::default());
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(core.get_suggestions("default"), SuggestionsState::default());
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    assert!(!agent.is_running());
}

/// **Scenario**: add then remove leaves the config map without the id.
#[test]
fn config_add_remove_round_trip() {
    let agent = conversation_agent(MockTurn::new());
    let (core, recorder) = setup(&agent);

    let id = core.add_suggestions_config(DynamicSuggestionsConfig::new("topics"));
    assert!(core.remove_suggestions_config(&id));
    assert!(!core.remove_suggestions_config(&id));

    let payloads = recorder.config_payloads.lock().unwrap();
    assert_eq!(payloads.len(), 2);
    assert!(payloads[0].contains_key(&id));
    assert!(!payloads[1].contains_key(&id));
    assert!(core.suggestions_config().is_empty());
}

/// **Scenario**: static suggestions appear synchronously, in config order, filtered by
/// consumer and availability.
#[test]
fn static_configs_apply_by_consumer_and_phase() {
    let agent = Arc::new(MockAgent::new());
    let (core, recorder) = setup(&agent);
    core.add_suggestions_config(StaticSuggestionsConfig::new(vec![
        Suggestion::new("Start", "Let's start"),
        Suggestion::new("Help", "What can you do?"),
    ]));
    core.add_suggestions_config(
        StaticSuggestionsConfig::new(vec![Suggestion::new("Other", "x")]).with_consumer("writer"),
    );
    core.add_suggestions_config(
        StaticSuggestionsConfig::new(vec![Suggestion::new("Later", "y")])
            .with_availability(SuggestionAvailability::AfterFirstMessage),
    );

    core.reload_suggestions("default");
    let state = core.get_suggestions("default");
    assert_eq!(titles(&state), vec!["Start", "Help"]);
    assert!(!state.is_loading);
    assert_eq!(recorder.started.load(Ordering::SeqCst), 0);

    agent.add_message(Message::user("hi"));
    core.reload_suggestions("default");
    assert_eq!(titles(&core.get_suggestions("default")), vec!["Later"]);
}

/// **Scenario**: a missing provider degrades to no suggestions, loading still settles.
#[tokio::test(start_paused = true)]
async fn missing_provider_degrades_to_empty() {
    let agent = conversation_agent(suggestion_turn(&["unused"]));
    let (core, recorder) = setup(&agent);
    core.add_suggestions_config(DynamicSuggestionsConfig::new("topics").with_provider("ghost"));

    core.reload_suggestions("default");
    tokio::time::sleep(Duration::from_millis(10)).await;

    let state = core.get_suggestions("default");
    assert!(state.suggestions.is_empty());
    assert!(!state.is_loading);
    assert_eq!(recorder.started.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
    assert_eq!(agent.run_count(), 0);
}

/// **Scenario**: an unknown consumer is a no-op without events.
#[tokio::test]
async fn unknown_consumer_is_noop() {
    let agent = conversation_agent(suggestion_turn(&["a"]));
    let (core, recorder) = setup(&agent);
    core.add_suggestions_config(DynamicSuggestionsConfig::new("topics"));

    core.reload_suggestions("nobody");
    assert_eq!(core.get_suggestions("nobody"), SuggestionsState::default());
    assert_eq!(recorder.started.load(Ordering::SeqCst), 0);
    assert!(recorder.changes.lock().unwrap().is_empty());
}

/// **Scenario**: a provider that answers without the suggestion tool yields an empty list.
#[tokio::test(start_paused = true)]
async fn unparseable_provider_output_is_swallowed() {
    let agent = conversation_agent(MockTurn::reply("I have no ideas"));
    let (core, recorder) = setup(&agent);
    core.add_suggestions_config(DynamicSuggestionsConfig::new("topics"));

    core.reload_suggestions("default");
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(core.get_suggestions("default"), SuggestionsState::default());
    assert_eq!(recorder.finished.load(Ordering::SeqCst), 1);
}

/// **Scenario**: the shadow run is grounded like any other run: it carries the current
/// context entries and a suggestion tool bounded by the config.
#[tokio::test(start_paused = true)]
async fn shadow_run_carries_context_and_bounded_tool() {
    let agent = conversation_agent(suggestion_turn(&["a", "b"]));
    let (core, _recorder) = setup(&agent);
    core.add_context("user name", "Ada");
    core.add_suggestions_config(DynamicSuggestionsConfig::new("topics").with_bounds(2, 4));

    core.reload_suggestions("default");
    tokio::time::sleep(Duration::from_millis(10)).await;

    let inputs = agent.inputs();
    assert_eq!(inputs.len(), 1);
    assert_eq!(inputs[0].context, vec![ContextEntry::new("user name", "Ada")]);
    assert_eq!(inputs[0].tools.len(), 1);
    let list = &inputs[0].tools[0].parameters["properties"]["suggestions"];
    assert_eq!(list["minItems"], 2);
    assert_eq!(list["maxItems"], 4);
    assert_eq!(
        inputs[0].forwarded_props["toolChoice"]["function"]["name"],
        SUGGESTION_TOOL_NAME
    );
}
