//! Core event fan-out.
//!
//! Every notification the core produces is a [`CoreEvent`] variant. Listeners implement
//! [`CoreSubscriber`], whose handlers are all optional (default no-op); [`dispatch`] routes a
//! variant to its handler. [`SubscriberSet`] is owned by one core instance: it snapshots the
//! current listeners, invokes each under `catch_unwind`, and logs a panicking listener without
//! affecting the others.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::context::ContextEntry;
use crate::error::ErrorCode;
use crate::registry::RuntimeConnectionStatus;
use crate::suggestions::{Suggestion, SuggestionsConfig};
use crate::sync::{read, write};

/// Emitted right before a tool handler is invoked.
#[derive(Debug, Clone)]
pub struct ToolExecutionStartEvent {
    pub tool_call_id: String,
    pub agent_id: String,
    pub tool_name: String,
    pub args: Value,
}

/// Emitted after a tool handler settled. `error` is set when the handler failed.
#[derive(Debug, Clone)]
pub struct ToolExecutionEndEvent {
    pub tool_call_id: String,
    pub agent_id: String,
    pub tool_name: String,
    pub result: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub code: ErrorCode,
    pub message: String,
    /// Free-form details: agent id, tool name, tool call id, runtime url.
    pub context: Value,
}

#[derive(Debug, Clone)]
pub enum CoreEvent {
    ToolExecutionStart(ToolExecutionStartEvent),
    ToolExecutionEnd(ToolExecutionEndEvent),
    AgentsChanged {
        agent_ids: Vec<String>,
    },
    ContextChanged {
        context: IndexMap<String, ContextEntry>,
    },
    SuggestionsConfigChanged {
        configs: IndexMap<String, SuggestionsConfig>,
    },
    SuggestionsChanged {
        agent_id: String,
        suggestions: Vec<Suggestion>,
    },
    SuggestionsStartedLoading {
        agent_id: String,
    },
    SuggestionsFinishedLoading {
        agent_id: String,
    },
    PropertiesChanged {
        properties: Map<String, Value>,
    },
    HeadersChanged {
        headers: BTreeMap<String, String>,
    },
    Error(ErrorEvent),
    RuntimeConnectionStatusChanged {
        status: RuntimeConnectionStatus,
    },
}

/// Typed listener; implement only the handlers you need.
///
/// Handlers run synchronously on the task that produced the event and must not block.
pub trait CoreSubscriber: Send + Sync {
    /// Entry point used by [`SubscriberSet`]. Override to observe every event uniformly.
    fn on_event(&self, event: &CoreEvent) {
        dispatch(event, self);
    }

    fn on_tool_execution_start(&self, _event: &ToolExecutionStartEvent) {}
    fn on_tool_execution_end(&self, _event: &ToolExecutionEndEvent) {}
    fn on_agents_changed(&self, _agent_ids: &[String]) {}
    fn on_context_changed(&self, _context: &IndexMap<String, ContextEntry>) {}
    fn on_suggestions_config_changed(&self, _configs: &IndexMap<String, SuggestionsConfig>) {}
    fn on_suggestions_changed(&self, _agent_id: &str, _suggestions: &[Suggestion]) {}
    fn on_suggestions_started_loading(&self, _agent_id: &str) {}
    fn on_suggestions_finished_loading(&self, _agent_id: &str) {}
    fn on_properties_changed(&self, _properties: &Map<String, Value>) {}
    fn on_headers_changed(&self, _headers: &BTreeMap<String, String>) {}
    fn on_error(&self, _event: &ErrorEvent) {}
    fn on_runtime_connection_status_changed(&self, _status: RuntimeConnectionStatus) {}
}

/// Routes `event` to the matching handler of `subscriber`.
pub fn dispatch<S: CoreSubscriber + ?Sized>(event: &CoreEvent, subscriber: &S) {
    match event {
        CoreEvent::ToolExecutionStart(e) => subscriber.on_tool_execution_start(e),
        CoreEvent::ToolExecutionEnd(e) => subscriber.on_tool_execution_end(e),
        CoreEvent::AgentsChanged { agent_ids } => subscriber.on_agents_changed(agent_ids),
        CoreEvent::ContextChanged { context } => subscriber.on_context_changed(context),
        CoreEvent::SuggestionsConfigChanged { configs } => {
            subscriber.on_suggestions_config_changed(configs)
        }
        CoreEvent::SuggestionsChanged {
            agent_id,
            suggestions,
        } => subscriber.on_suggestions_changed(agent_id, suggestions),
        CoreEvent::SuggestionsStartedLoading { agent_id } => {
            subscriber.on_suggestions_started_loading(agent_id)
        }
        CoreEvent::SuggestionsFinishedLoading { agent_id } => {
            subscriber.on_suggestions_finished_loading(agent_id)
        }
        CoreEvent::PropertiesChanged { properties } => subscriber.on_properties_changed(properties),
        CoreEvent::HeadersChanged { headers } => subscriber.on_headers_changed(headers),
        CoreEvent::Error(e) => subscriber.on_error(e),
        CoreEvent::RuntimeConnectionStatusChanged { status } => {
            subscriber.on_runtime_connection_status_changed(*status)
        }
    }
}

/// Handle returned by [`SubscriberSet::subscribe`]. Dropping it keeps the listener registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    set: Weak<SubscriberSet>,
}

impl Subscription {
    /// Removes the listener. Calling it more than once is a no-op.
    pub fn unsubscribe(&self) {
        if let Some(set) = self.set.upgrade() {
            set.remove(self.id);
        }
    }
}

/// Listener registry owned by one core instance.
#[derive(Default)]
pub struct SubscriberSet {
    subscribers: RwLock<Vec<(u64, Arc<dyn CoreSubscriber>)>>,
    next_id: AtomicU64,
}

impl SubscriberSet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, subscriber: Arc<dyn CoreSubscriber>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        write(&self.subscribers).push((id, subscriber));
        Subscription {
            id,
            set: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        write(&self.subscribers).retain(|(sid, _)| *sid != id);
    }

    pub fn len(&self) -> usize {
        read(&self.subscribers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `event` to every listener registered at call time.
    pub fn notify(&self, event: &CoreEvent) {
        let snapshot: Vec<Arc<dyn CoreSubscriber>> = read(&self.subscribers)
            .iter()
            .map(|(_, s)| Arc::clone(s))
            .collect();
        for subscriber in snapshot {
            if catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))).is_err() {
                error!(event = ?event_name(event), "subscriber panicked while handling event");
            }
        }
    }

    /// Logs and broadcasts an error event.
    pub fn emit_error(&self, code: ErrorCode, message: impl Into<String>, context: Value) {
        let message = message.into();
        warn!(code = %code, error = %message, "core error");
        self.notify(&CoreEvent::Error(ErrorEvent {
            code,
            message,
            context,
        }));
    }
}

fn event_name(event: &CoreEvent) -> &'static str {
    match event {
        CoreEvent::ToolExecutionStart(_) => "tool_execution_start",
        CoreEvent::ToolExecutionEnd(_) => "tool_execution_end",
        CoreEvent::AgentsChanged { .. } => "agents_changed",
        CoreEvent::ContextChanged { .. } => "context_changed",
        CoreEvent::SuggestionsConfigChanged { .. } => "suggestions_config_changed",
        CoreEvent::SuggestionsChanged { .. } => "suggestions_changed",
        CoreEvent::SuggestionsStartedLoading { .. } => "suggestions_started_loading",
        CoreEvent::SuggestionsFinishedLoading { .. } => "suggestions_finished_loading",
        CoreEvent::PropertiesChanged { .. } => "properties_changed",
        CoreEvent::HeadersChanged { .. } => "headers_changed",
        CoreEvent::Error(_) => "error",
        CoreEvent::RuntimeConnectionStatusChanged { .. } => "runtime_connection_status_changed",
    }
}
