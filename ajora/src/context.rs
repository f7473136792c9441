//! Ad-hoc grounding context visible to agent runs.
//!
//! Entries are created and removed explicitly by the caller (typically tied to a UI
//! component's lifetime). Every change is broadcast as `ContextChanged`. The run handler takes
//! a [`ContextStore::entries`] snapshot when it builds each run's input, so a context removed
//! before that point never reaches the run.

use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::subscriber::{CoreEvent, SubscriberSet};
use crate::sync::{read, write};

/// One grounding entry: a human-readable description and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub description: String,
    pub value: String,
}

impl ContextEntry {
    pub fn new(description: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            value: value.into(),
        }
    }
}

pub struct ContextStore {
    entries: RwLock<IndexMap<String, ContextEntry>>,
    subscribers: Arc<SubscriberSet>,
}

impl ContextStore {
    pub fn new(subscribers: Arc<SubscriberSet>) -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
            subscribers,
        }
    }

    /// Stores `entry` under a fresh id and returns the id. Visible to reads immediately.
    pub fn add(&self, entry: ContextEntry) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        debug!(context_id = %id, description = %entry.description, "context added");
        write(&self.entries).insert(id.clone(), entry);
        self.notify();
        id
    }

    /// Removes the entry; returns whether it existed. Unknown ids do not notify.
    pub fn remove(&self, id: &str) -> bool {
        let removed = write(&self.entries).shift_remove(id).is_some();
        if removed {
            debug!(context_id = %id, "context removed");
            self.notify();
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<ContextEntry> {
        read(&self.entries).get(id).cloned()
    }

    /// Snapshot keyed by id, in insertion order.
    pub fn snapshot(&self) -> IndexMap<String, ContextEntry> {
        read(&self.entries).clone()
    }

    /// Entries in insertion order, as injected into a run.
    pub fn entries(&self) -> Vec<ContextEntry> {
        read(&self.entries).values().cloned().collect()
    }

    fn notify(&self) {
        self.subscribers.notify(&CoreEvent::ContextChanged {
            context: self.snapshot(),
        });
    }
}
