//! [`AgentCore`]: the state every agent carries, plus lifecycle notification.
//!
//! Implementations call [`AgentCore::begin_run`] at the start of `run`, append messages as
//! they are produced, then settle with [`AgentCore::finalize_run`] or
//! [`AgentCore::fail_run`]. Subscribers observe each step.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::agent::{AgentSubscriber, RunLifecycle};
use crate::error::AgentError;
use crate::message::Message;
use crate::sync::{lock, read, write};

#[derive(Default)]
struct SubscriberList {
    entries: RwLock<Vec<(u64, Arc<dyn AgentSubscriber>)>>,
    next_id: AtomicU64,
}

impl SubscriberList {
    fn snapshot(&self) -> Vec<Arc<dyn AgentSubscriber>> {
        read(&self.entries).iter().map(|(_, s)| Arc::clone(s)).collect()
    }
}

/// Handle returned by [`AgentCore::subscribe`]; `unsubscribe` is idempotent.
#[derive(Debug)]
pub struct AgentSubscription {
    id: u64,
    list: Weak<SubscriberList>,
}

impl AgentSubscription {
    pub fn unsubscribe(&self) {
        if let Some(list) = self.list.upgrade() {
            write(&list.entries).retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for SubscriberList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberList")
            .field("len", &read(&self.entries).len())
            .finish()
    }
}

pub struct AgentCore {
    agent_id: RwLock<Option<String>>,
    description: Option<String>,
    thread_id: RwLock<String>,
    messages: RwLock<Vec<Message>>,
    state: RwLock<Value>,
    running: AtomicBool,
    abort_token: Mutex<CancellationToken>,
    current_run: Mutex<Option<RunLifecycle>>,
    subscribers: Arc<SubscriberList>,
    headers: RwLock<BTreeMap<String, String>>,
    properties: RwLock<Map<String, Value>>,
}

impl Default for AgentCore {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentCore {
    /// Empty conversation on a fresh thread id.
    pub fn new() -> Self {
        Self {
            agent_id: RwLock::new(None),
            description: None,
            thread_id: RwLock::new(uuid::Uuid::new_v4().to_string()),
            messages: RwLock::new(Vec::new()),
            state: RwLock::new(Value::Object(Map::new())),
            running: AtomicBool::new(false),
            abort_token: Mutex::new(CancellationToken::new()),
            current_run: Mutex::new(None),
            subscribers: Arc::new(SubscriberList::default()),
            headers: RwLock::new(BTreeMap::new()),
            properties: RwLock::new(Map::new()),
        }
    }

    pub fn with_agent_id(self, id: impl Into<String>) -> Self {
        *write(&self.agent_id) = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_thread_id(self, thread_id: impl Into<String>) -> Self {
        *write(&self.thread_id) = thread_id.into();
        self
    }

    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        *write(&self.messages) = messages;
        self
    }

    /// Copy for an isolated execution context: messages, thread id, state, identity and
    /// request settings by value; fresh subscribers, abort token and running flag.
    pub fn fork(&self) -> Self {
        Self {
            agent_id: RwLock::new(self.agent_id()),
            description: self.description.clone(),
            thread_id: RwLock::new(self.thread_id()),
            messages: RwLock::new(self.messages()),
            state: RwLock::new(self.state()),
            running: AtomicBool::new(false),
            abort_token: Mutex::new(CancellationToken::new()),
            current_run: Mutex::new(None),
            subscribers: Arc::new(SubscriberList::default()),
            headers: RwLock::new(self.headers()),
            properties: RwLock::new(self.properties()),
        }
    }

    pub fn agent_id(&self) -> Option<String> {
        read(&self.agent_id).clone()
    }

    pub fn set_agent_id(&self, id: &str) {
        *write(&self.agent_id) = Some(id.to_string());
    }

    pub fn description(&self) -> Option<String> {
        self.description.clone()
    }

    pub fn thread_id(&self) -> String {
        read(&self.thread_id).clone()
    }

    pub fn set_thread_id(&self, thread_id: impl Into<String>) {
        *write(&self.thread_id) = thread_id.into();
    }

    pub fn messages(&self) -> Vec<Message> {
        read(&self.messages).clone()
    }

    pub fn set_messages(&self, messages: Vec<Message>) {
        *write(&self.messages) = messages;
        self.notify_messages();
    }

    pub fn add_message(&self, message: Message) {
        write(&self.messages).push(message);
        self.notify_messages();
    }

    /// Appends `messages` with a single change notification.
    pub fn add_messages(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            return;
        }
        write(&self.messages).extend(messages);
        self.notify_messages();
    }

    pub fn state(&self) -> Value {
        read(&self.state).clone()
    }

    pub fn set_state(&self, state: Value) {
        *write(&self.state) = state.clone();
        self.each_subscriber(|s| s.on_state_changed(&state));
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn headers(&self) -> BTreeMap<String, String> {
        read(&self.headers).clone()
    }

    pub fn set_headers(&self, headers: BTreeMap<String, String>) {
        *write(&self.headers) = headers;
    }

    pub fn properties(&self) -> Map<String, Value> {
        read(&self.properties).clone()
    }

    pub fn set_properties(&self, properties: Map<String, Value>) {
        *write(&self.properties) = properties;
    }

    pub fn subscribe(&self, subscriber: Arc<dyn AgentSubscriber>) -> AgentSubscription {
        let id = self.subscribers.next_id.fetch_add(1, Ordering::Relaxed);
        write(&self.subscribers.entries).push((id, subscriber));
        AgentSubscription {
            id,
            list: Arc::downgrade(&self.subscribers),
        }
    }

    /// Marks the run as started and returns the token that `abort` will cancel.
    pub fn begin_run(&self, run_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        *lock(&self.abort_token) = token.clone();
        let run = RunLifecycle {
            agent_id: self.agent_id(),
            thread_id: self.thread_id(),
            run_id: run_id.to_string(),
        };
        *lock(&self.current_run) = Some(run.clone());
        self.running.store(true, Ordering::SeqCst);
        debug!(agent_id = ?run.agent_id, run_id = %run.run_id, "run initialized");
        self.each_subscriber(|s| s.on_run_initialized(&run));
        token
    }

    /// Settles the current run successfully (also used after an abort: whatever was appended
    /// up to that point belongs to this run).
    pub fn finalize_run(&self) {
        self.running.store(false, Ordering::SeqCst);
        let Some(run) = lock(&self.current_run).take() else {
            return;
        };
        let messages = self.messages();
        let state = self.state();
        debug!(agent_id = ?run.agent_id, run_id = %run.run_id, "run finalized");
        self.each_subscriber(|s| s.on_run_finalized(&run, &messages, &state));
    }

    pub fn fail_run(&self, error: &AgentError) {
        self.running.store(false, Ordering::SeqCst);
        let Some(run) = lock(&self.current_run).take() else {
            return;
        };
        debug!(agent_id = ?run.agent_id, run_id = %run.run_id, error = %error, "run failed");
        self.each_subscriber(|s| s.on_run_failed(&run, error));
    }

    /// Reports a run-level error event for the current run without settling it.
    pub fn report_run_error(&self, message: &str, code: Option<&str>) {
        let Some(run) = lock(&self.current_run).clone() else {
            return;
        };
        self.each_subscriber(|s| s.on_run_error_event(&run, message, code));
    }

    /// Cancels the token handed out by the latest `begin_run`.
    pub fn abort(&self) {
        if self.is_running() {
            debug!(agent_id = ?self.agent_id(), "abort requested");
        }
        lock(&self.abort_token).cancel();
    }

    fn notify_messages(&self) {
        let messages = self.messages();
        self.each_subscriber(|s| s.on_messages_changed(&messages));
    }

    fn each_subscriber(&self, f: impl Fn(&dyn AgentSubscriber)) {
        for subscriber in self.subscribers.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| f(subscriber.as_ref()))).is_err() {
                error!(agent_id = ?self.agent_id(), "agent subscriber panicked");
            }
        }
    }
}
