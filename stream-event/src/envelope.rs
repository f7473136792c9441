//! Envelope (`core_id`, `event_id`) attached to each serialized event.
//! [`EnvelopeState`] hands out monotonically increasing event ids for one core instance.

use crate::event::ProtocolEvent;
use serde_json::Value;

#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Identifies the core instance that produced the event.
    pub core_id: Option<String>,
    /// Per-event sequence number; monotonically increasing within one core.
    pub event_id: Option<u64>,
}

impl Envelope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_core_id(mut self, id: impl Into<String>) -> Self {
        self.core_id = Some(id.into());
        self
    }

    pub fn with_event_id(mut self, id: u64) -> Self {
        self.event_id = Some(id);
        self
    }

    /// Merges envelope fields into the given JSON object (top-level only).
    /// Existing keys are never overwritten.
    pub fn inject_into(&self, obj: &mut Value) {
        let Some(obj) = obj.as_object_mut() else {
            return;
        };
        if let Some(ref id) = self.core_id {
            obj.entry("core_id")
                .or_insert_with(|| Value::String(id.clone()));
        }
        if let Some(id) = self.event_id {
            obj.entry("event_id")
                .or_insert_with(|| Value::Number(serde_json::Number::from(id)));
        }
    }
}

/// Envelope state for one core: its id and the next event id.
#[derive(Debug)]
pub struct EnvelopeState {
    pub core_id: String,
    pub next_event_id: u64,
}

impl EnvelopeState {
    pub fn new(core_id: impl Into<String>) -> Self {
        Self {
            core_id: core_id.into(),
            next_event_id: 1,
        }
    }

    /// Injects the envelope into `value` and advances the event id.
    pub fn inject_into(&mut self, value: &mut Value) {
        let env = Envelope::new()
            .with_core_id(&self.core_id)
            .with_event_id(self.next_event_id);
        self.next_event_id += 1;
        env.inject_into(value);
    }
}

/// Converts a protocol event to JSON and injects the envelope from `state`.
pub fn to_json(
    event: &ProtocolEvent,
    state: &mut EnvelopeState,
) -> Result<Value, serde_json::Error> {
    let mut value = event.to_value()?;
    state.inject_into(&mut value);
    Ok(value)
}
