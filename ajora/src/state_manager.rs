//! Run history index: state snapshot per run, and the run each message was produced in.
//!
//! Tracked agents are observed through [`AgentSubscriber::on_run_finalized`]: the agent's state
//! is stored under `(agent_id, thread_id, run_id)` and every message present at that point
//! that has no run yet is assigned to this run. Nothing is evicted implicitly; callers bound
//! memory with [`StateManager::clear_thread`] and [`StateManager::clear_agent`].

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::agent::{Agent, AgentSubscriber, AgentSubscription, RunLifecycle};
use crate::message::Message;

type ThreadKey = (String, String);

#[derive(Debug, Default)]
struct ThreadRuns {
    /// run id → state snapshot, in finalize order.
    runs: IndexMap<String, Value>,
    /// message id → run id.
    message_runs: HashMap<String, String>,
}

type Index = DashMap<ThreadKey, ThreadRuns>;

struct Tracked {
    agent_ptr: usize,
    subscription: AgentSubscription,
}

#[derive(Default)]
pub struct StateManager {
    index: Arc<Index>,
    tracked: DashMap<String, Tracked>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts indexing runs of `agent` under `agent_id`. Tracking the same agent again is a
    /// no-op; a different agent under the same id replaces the previous one.
    pub fn track_agent(&self, agent_id: &str, agent: &Arc<dyn Agent>) {
        let agent_ptr = Arc::as_ptr(agent) as *const () as usize;
        if let Some(existing) = self.tracked.get(agent_id) {
            if existing.agent_ptr == agent_ptr {
                return;
            }
        }
        let subscription = agent.subscribe(Arc::new(RunIndexer {
            agent_id: agent_id.to_string(),
            index: Arc::clone(&self.index),
        }));
        debug!(agent_id = %agent_id, "tracking agent runs");
        if let Some(previous) = self.tracked.insert(
            agent_id.to_string(),
            Tracked {
                agent_ptr,
                subscription,
            },
        ) {
            previous.subscription.unsubscribe();
        }
    }

    /// Stops indexing; already indexed runs stay.
    pub fn untrack_agent(&self, agent_id: &str) {
        if let Some((_, tracked)) = self.tracked.remove(agent_id) {
            tracked.subscription.unsubscribe();
        }
    }

    pub fn get_state_by_run(&self, agent_id: &str, thread_id: &str, run_id: &str) -> Option<Value> {
        self.index
            .get(&key(agent_id, thread_id))
            .and_then(|t| t.runs.get(run_id).cloned())
    }

    pub fn get_run_id_for_message(
        &self,
        agent_id: &str,
        thread_id: &str,
        message_id: &str,
    ) -> Option<String> {
        self.index
            .get(&key(agent_id, thread_id))
            .and_then(|t| t.message_runs.get(message_id).cloned())
    }

    /// Run ids of the thread in the order the runs finalized.
    pub fn get_run_ids_for_thread(&self, agent_id: &str, thread_id: &str) -> Vec<String> {
        self.index
            .get(&key(agent_id, thread_id))
            .map(|t| t.runs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear_thread(&self, agent_id: &str, thread_id: &str) -> bool {
        self.index.remove(&key(agent_id, thread_id)).is_some()
    }

    /// Drops every thread of `agent_id`; returns how many were removed.
    pub fn clear_agent(&self, agent_id: &str) -> usize {
        let before = self.index.len();
        self.index.retain(|(agent, _), _| agent != agent_id);
        before - self.index.len()
    }

    fn record(index: &Index, agent_id: &str, run: &RunLifecycle, messages: &[Message], state: &Value) {
        let mut entry = index.entry(key(agent_id, &run.thread_id)).or_default();
        entry.runs.insert(run.run_id.clone(), state.clone());
        let mut assigned = 0usize;
        for message in messages {
            if !entry.message_runs.contains_key(message.id()) {
                entry
                    .message_runs
                    .insert(message.id().to_string(), run.run_id.clone());
                assigned += 1;
            }
        }
        trace!(agent_id = %agent_id, run_id = %run.run_id, assigned, "run indexed");
    }
}

fn key(agent_id: &str, thread_id: &str) -> ThreadKey {
    (agent_id.to_string(), thread_id.to_string())
}

struct RunIndexer {
    agent_id: String,
    index: Arc<Index>,
}

impl AgentSubscriber for RunIndexer {
    fn on_run_finalized(&self, run: &RunLifecycle, messages: &[Message], state: &Value) {
        StateManager::record(&self.index, &self.agent_id, run, messages, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{MockAgent, MockTurn, RunAgentInput};
    use serde_json::json;

    fn input(agent: &dyn Agent, run_id: &str) -> RunAgentInput {
        RunAgentInput {
            thread_id: agent.thread_id(),
            run_id: run_id.to_string(),
            messages: agent.messages(),
            tools: Vec::new(),
            context: Vec::new(),
            forwarded_props: json!({}),
        }
    }

    /// **Scenario**: each message maps to the run that first saw it; states are kept per run.
    #[tokio::test]
    async fn indexes_messages_and_states_per_run() {
        let agent: Arc<dyn Agent> = Arc::new(
            MockAgent::new()
                .with_messages(vec![Message::user("hi").with_id("u1")])
                .with_turns([
                    MockTurn::new()
                        .with_message(Message::assistant("a").with_id("a1"))
                        .with_state(json!({"step": 1})),
                    MockTurn::new()
                        .with_message(Message::assistant("b").with_id("a2"))
                        .with_state(json!({"step": 2})),
                ]),
        );
        let manager = StateManager::new();
        manager.track_agent("default", &agent);
        manager.track_agent("default", &agent);
        let thread = agent.thread_id();

        agent.run(input(agent.as_ref(), "r1")).await.unwrap();
        agent.run(input(agent.as_ref(), "r2")).await.unwrap();

        assert_eq!(manager.get_run_ids_for_thread("default", &thread), vec!["r1", "r2"]);
        assert_eq!(
            manager.get_state_by_run("default", &thread, "r1"),
            Some(json!({"step": 1}))
        );
        assert_eq!(
            manager.get_run_id_for_message("default", &thread, "u1").as_deref(),
            Some("r1")
        );
        assert_eq!(
            manager.get_run_id_for_message("default", &thread, "a2").as_deref(),
            Some("r2")
        );
    }

    /// **Scenario**: clearing bounds memory per thread or per agent; untracked agents stop indexing.
    #[tokio::test]
    async fn clear_and_untrack() {
        let agent: Arc<dyn Agent> =
            Arc::new(MockAgent::new().with_fallback(MockTurn::reply("ok")));
        let manager = StateManager::new();
        manager.track_agent("a", &agent);
        let thread = agent.thread_id();

        agent.run(input(agent.as_ref(), "r1")).await.unwrap();
        assert!(manager.clear_thread("a", &thread));
        assert!(!manager.clear_thread("a", &thread));

        agent.run(input(agent.as_ref(), "r2")).await.unwrap();
        assert_eq!(manager.clear_agent("a"), 1);

        manager.untrack_agent("a");
        agent.run(input(agent.as_ref(), "r3")).await.unwrap();
        assert!(manager.get_run_ids_for_thread("a", &thread).is_empty());
    }
}
