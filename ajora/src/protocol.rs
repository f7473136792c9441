//! Bridge from [`CoreEvent`] to the `stream-event` wire shape, for inspectors and devtools.

use std::sync::Mutex;

use serde_json::Value;
use stream_event::{to_json, EnvelopeState, ProtocolEvent};
use tracing::warn;

use crate::subscriber::{CoreEvent, CoreSubscriber};
use crate::sync::lock;

/// Maps one core event to its protocol form.
pub fn to_protocol_event(event: &CoreEvent) -> ProtocolEvent {
    fn value<T: serde::Serialize>(payload: &T) -> Value {
        serde_json::to_value(payload).unwrap_or(Value::Null)
    }

    match event {
        CoreEvent::ToolExecutionStart(e) => ProtocolEvent::ToolExecutionStart {
            tool_call_id: e.tool_call_id.clone(),
            agent_id: e.agent_id.clone(),
            tool_name: e.tool_name.clone(),
            args: e.args.clone(),
        },
        CoreEvent::ToolExecutionEnd(e) => ProtocolEvent::ToolExecutionEnd {
            tool_call_id: e.tool_call_id.clone(),
            agent_id: e.agent_id.clone(),
            tool_name: e.tool_name.clone(),
            result: e.result.clone(),
            error: e.error.clone(),
        },
        CoreEvent::AgentsChanged { agent_ids } => ProtocolEvent::AgentsChanged {
            agent_ids: agent_ids.clone(),
        },
        CoreEvent::ContextChanged { context } => ProtocolEvent::ContextChanged {
            context: value(context),
        },
        CoreEvent::SuggestionsConfigChanged { configs } => {
            ProtocolEvent::SuggestionsConfigChanged {
                configs: value(configs),
            }
        }
        CoreEvent::SuggestionsChanged {
            agent_id,
            suggestions,
        } => ProtocolEvent::SuggestionsChanged {
            agent_id: agent_id.clone(),
            suggestions: value(suggestions),
        },
        CoreEvent::SuggestionsStartedLoading { agent_id } => {
            ProtocolEvent::SuggestionsStartedLoading {
                agent_id: agent_id.clone(),
            }
        }
        CoreEvent::SuggestionsFinishedLoading { agent_id } => {
            ProtocolEvent::SuggestionsFinishedLoading {
                agent_id: agent_id.clone(),
            }
        }
        CoreEvent::PropertiesChanged { properties } => ProtocolEvent::PropertiesChanged {
            properties: value(properties),
        },
        CoreEvent::HeadersChanged { headers } => ProtocolEvent::HeadersChanged {
            headers: value(headers),
        },
        CoreEvent::Error(e) => ProtocolEvent::Error {
            code: e.code.as_str().to_string(),
            message: e.message.clone(),
            context: e.context.clone(),
        },
        CoreEvent::RuntimeConnectionStatusChanged { status } => {
            ProtocolEvent::RuntimeConnectionStatusChanged {
                status: status.as_str().to_string(),
            }
        }
    }
}

type Sink = Box<dyn Fn(Value) + Send + Sync>;

/// Subscriber that serializes every core event with an envelope and hands it to `sink`.
pub struct ProtocolSubscriber {
    state: Mutex<EnvelopeState>,
    sink: Sink,
}

impl ProtocolSubscriber {
    pub fn new(core_id: impl Into<String>, sink: impl Fn(Value) + Send + Sync + 'static) -> Self {
        Self {
            state: Mutex::new(EnvelopeState::new(core_id)),
            sink: Box::new(sink),
        }
    }
}

impl CoreSubscriber for ProtocolSubscriber {
    fn on_event(&self, event: &CoreEvent) {
        let protocol = to_protocol_event(event);
        let encoded = to_json(&protocol, &mut lock(&self.state));
        match encoded {
            Ok(value) => (self.sink)(value),
            Err(err) => warn!(error = %err, "failed to encode core event"),
        }
    }
}
