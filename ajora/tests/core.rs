//! Integration tests for the `AjoraCore` façade: headers and properties, the protocol bridge,
//! run-state indexing and environment-driven configuration.


use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use ajora::{
    Agent, AjoraCore, ConfigError, CoreConfig, CoreError, CoreSubscriber, Message, MockAgent,
    MockTurn, ProtocolSubscriber, RunAgentInput, RuntimeConnectionStatus, RuntimeTransport,
    RUNTIME_TRANSPORT_ENV, RUNTIME_URL_ENV,
};
use serde_json::{json, Map, Value};

#[derive(Default)]
struct Changes {
    headers: Mutex<Vec<BTreeMap<String, String>>>,
    properties: Mutex<Vec<Map<String, Value>>>,
}

impl CoreSubscriber for Changes {
    fn on_headers_changed(&self, headers: &BTreeMap<String, String>) {
        self.headers.lock().unwrap().push(headers.clone());
    }
    fn on_properties_changed(&self, properties: &Map<String, Value>) {
        self.properties.lock().unwrap().push(properties.clone());
    }
}

/// **Scenario**: replacing headers and properties notifies subscribers and gives every
/// registered agent its own copy.
#[test]
fn headers_and_properties_reach_agents() {
    let agent = Arc::new(MockAgent::new());
    let core = AjoraCore::new(CoreConfig::new().with_agent("default", agent.clone()));
    let changes = Arc::new(Changes::default());
    let _s = core.subscribe(changes.clone());

    let headers = BTreeMap::from([("authorization".to_string(), "Bearer t".to_string())]);
    core.set_headers(headers.clone());
    let mut properties = Map::new();
    properties.insert("userId".to_string(), json!("u-1"));
    core.set_properties(properties.clone());

    assert_eq!(core.headers(), headers);
    assert_eq!(agent.core().headers(), headers);
    assert_eq!(agent.core().properties(), properties);
    assert_eq!(*changes.headers.lock().unwrap(), vec![headers]);
    assert_eq!(*changes.properties.lock().unwrap(), vec![properties]);

    let late = Arc::new(MockAgent::new());
    core.add_agent("late", late.clone());
    assert_eq!(late.core().headers(), core.headers());
    assert_eq!(late.agent_id().as_deref(), Some("late"));
}

/// **Scenario**: a protocol subscriber receives every event in wire shape stamped with the
/// core id.
#[test]
fn protocol_subscriber_streams_core_events() {
    let core = AjoraCore::new(CoreConfig::new());
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let _s = core.subscribe(Arc::new(ProtocolSubscriber::new(core.id(), move |v| {
        sink.lock().unwrap().push(v)
    })));

    let id = core.add_context("Current page", "checkout");
    core.remove_context(&id);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["type"], "context_changed");
    assert_eq!(received[0]["core_id"], core.id());
    assert_eq!(received[0]["context"][&id]["value"], "checkout");
    assert_eq!(received[1]["event_id"], 2);
    assert_eq!(received[1]["context"], json!({}));
}

/// **Scenario**: finalized runs are indexed by thread; every message maps to the run that
/// first produced it, and clearing the thread forgets them.
#[tokio::test]
async fn runs_are_indexed_per_thread() {
    let agent = Arc::new(
        MockAgent::new()
            .with_turn(MockTurn::reply("first").with_state(json!({"step": 1})))
            .with_turn(MockTurn::reply("second").with_state(json!({"step": 2}))),
    );
    let core = AjoraCore::new(CoreConfig::new().with_agent("default", agent.clone()));
    let thread = agent.thread_id();

    let first = core
        .run_agent_by_id("default", vec![Message::user("one")])
        .await
        .unwrap();
    let second = core
        .run_agent_by_id("default", vec![Message::user("two")])
        .await
        .unwrap();

    let manager = core.state_manager();
    let runs = manager.get_run_ids_for_thread("default", &thread);
    assert_eq!(runs.len(), 2);
    assert_eq!(
        manager.get_state_by_run("default", &thread, &runs[0]),
        Some(json!({"step": 1}))
    );
    assert_eq!(
        manager.get_run_id_for_message("default", &thread, first.new_messages[0].id()),
        Some(runs[0].clone())
    );
    assert_eq!(
        manager.get_run_id_for_message("default", &thread, second.new_messages[0].id()),
        Some(runs[1].clone())
    );

    assert!(manager.clear_thread("default", &thread));
    assert!(manager.get_run_ids_for_thread("default", &thread).is_empty());
}

fn direct_input(agent: &dyn Agent, run_id: &str) -> RunAgentInput {
    RunAgentInput {
        thread_id: agent.thread_id(),
        run_id: run_id.to_string(),
        messages: agent.messages(),
        tools: Vec::new(),
        context: Vec::new(),
        forwarded_props: json!({}),
    }
}

/// **Scenario**: registered agents are indexed from registration on, even for runs the core
/// does not drive; agents replaced by `set_agents` stop being indexed.
#[tokio::test]
async fn registered_agents_are_indexed_until_replaced() {
    let first = Arc::new(MockAgent::new().with_fallback(MockTurn::reply("ok")));
    let core = AjoraCore::new(CoreConfig::new());
    core.add_agent("solo", first.clone());
    let thread = first.thread_id();

    first.run(direct_input(first.as_ref(), "r1")).await.unwrap();
    let manager = core.state_manager();
    assert_eq!(manager.get_run_ids_for_thread("solo", &thread), vec!["r1"]);

    let second = Arc::new(MockAgent::new().with_fallback(MockTurn::reply("ok")));
    let mut agents: indexmap::IndexMap<String, Arc<dyn Agent>> = indexmap::IndexMap::new();
    agents.insert("other".to_string(), second.clone());
    core.set_agents(agents);

    first.run(direct_input(first.as_ref(), "r2")).await.unwrap();
    second.run(direct_input(second.as_ref(), "r3")).await.unwrap();
    assert_eq!(manager.get_run_ids_for_thread("solo", &thread), vec!["r1"]);
    assert_eq!(
        manager.get_run_ids_for_thread("other", &second.thread_id()),
        vec!["r3"]
    );
}

/// **Scenario**: without a tokio runtime, a configured runtime is not contacted and the core
/// stays usable; discovery waits for an explicit connect.
#[test]
fn runtime_url_without_async_runtime_stays_disconnected() {
    let core = AjoraCore::new(CoreConfig::new().with_runtime_url("http://127.0.0.1:9/"));
    assert_eq!(core.runtime_url().as_deref(), Some("http://127.0.0.1:9"));
    assert_eq!(
        core.runtime_connection_status(),
        RuntimeConnectionStatus::Disconnected
    );
}

/// **Scenario**: running an unknown agent id is a setup error, not a run failure.
#[tokio::test]
async fn unknown_agent_id_is_not_found() {
    let core = AjoraCore::new(CoreConfig::new());
    let err = core.run_agent_by_id("ghost", Vec::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::AgentNotFound(ref id) if id == "ghost"));
    assert_eq!(err.code(), None);
}

/// **Scenario**: runtime settings come from `$XDG_CONFIG_HOME/ajora/config.toml`; an unknown
/// transport name is rejected.
#[test]
fn config_from_env_reads_xdg_file() {
    let dir = tempfile::tempdir().unwrap();
    let app_dir = dir.path().join("ajora");
    std::fs::create_dir_all(&app_dir).unwrap();
    std::fs::write(
        app_dir.join("config.toml"),
        "[env]\nAJORA_RUNTIME_URL = \"http://runtime.test/api\"\nAJORA_RUNTIME_TRANSPORT = \"Single\"\n",
    )
    .unwrap();

    let prev_home = std::env::var("XDG_CONFIG_HOME").ok();
    std::env::set_var("XDG_CONFIG_HOME", dir.path());
    std::env::remove_var(RUNTIME_URL_ENV);
    std::env::remove_var(RUNTIME_TRANSPORT_ENV);

    let config = CoreConfig::from_env();

    std::env::set_var(RUNTIME_TRANSPORT_ENV, "carrier-pigeon");
    let rejected = CoreConfig::from_env();

    std::env::remove_var(RUNTIME_URL_ENV);
    std::env::remove_var(RUNTIME_TRANSPORT_ENV);
    match prev_home {
        Some(p) => std::env::set_var("XDG_CONFIG_HOME", p),
        None => std::env::remove_var("XDG_CONFIG_HOME"),
    }

    let config = config.unwrap();
    assert_eq!(config.runtime_url.as_deref(), Some("http://runtime.test/api"));
    assert_eq!(config.runtime_transport, RuntimeTransport::Single);
    assert!(matches!(rejected, Err(ConfigError::Transport(_))));
}
