//! # Ajora
//!
//! Agent run orchestration core. [`AjoraCore`] drives externally supplied [`Agent`]s through
//! a tool-execution loop, keeps per-agent suggestions, discovers agents announced by a remote
//! runtime, and indexes run state for history views. Everything the core does is observable
//! through [`CoreSubscriber`].
//!
//! ## Main modules
//!
//! - [`agent`]: the [`Agent`] capability trait, [`AgentCore`] shared state, [`MockAgent`] and
//!   [`ProxiedAgent`].
//! - [`run_handler`]: [`RunHandler`], the tool loop with follow-up runs.
//! - [`tools`]: [`FrontendTool`], [`ToolRegistry`], [`ToolHandler`].
//! - [`suggestions`]: [`SuggestionEngine`] with static and dynamic configs.
//! - [`registry`]: [`AgentRegistry`], runtime discovery ([`RuntimeClient`], [`HttpRuntimeClient`]).
//! - [`state_manager`]: [`StateManager`], run state and message-to-run index.
//! - [`context`]: [`ContextStore`] grounding entries.
//! - [`subscriber`]: [`CoreEvent`], [`CoreSubscriber`], [`SubscriberSet`].
//! - [`protocol`]: [`ProtocolSubscriber`], the `stream-event` bridge.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ajora::{AjoraCore, CoreConfig, FrontendTool, Message, MockAgent, MockTurn, RunAgentOptions};
//! use ajora::message::ToolCall;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), ajora::CoreError> {
//! let agent = Arc::new(
//!     MockAgent::new()
//!         .with_turn(MockTurn::tool_calls(vec![ToolCall::new("c1", "get_time", "")]))
//!         .with_turn(MockTurn::reply("It is noon.")),
//! );
//! let core = AjoraCore::new(
//!     CoreConfig::new()
//!         .with_agent("default", agent.clone())
//!         .with_tool(FrontendTool::new("get_time").with_handler_fn(|_args, _call| async {
//!             Ok(json!("12:00"))
//!         })),
//! );
//! let result = core
//!     .run_agent(RunAgentOptions::new(agent).with_messages(vec![Message::user("Time?")]))
//!     .await?;
//! assert_eq!(result.new_messages[0].text(), Some("It is noon."));
//! # Ok(())
//! # }
//! ```

pub mod agent;
mod ajora_core;
pub mod context;
pub mod error;
pub mod message;
pub mod protocol;
pub mod registry;
pub mod run_handler;
pub mod state_manager;
pub mod subscriber;
pub mod suggestions;
mod sync;
pub mod tools;

pub use agent::{
    Agent, AgentCore, AgentSubscriber, AgentSubscription, MockAgent, MockTurn, ProxiedAgent,
    RunAgentInput, RunAgentResult, RunLifecycle,
};
pub use ajora_core::{AjoraCore, CoreConfig, RUNTIME_TRANSPORT_ENV, RUNTIME_URL_ENV};
pub use context::{ContextEntry, ContextStore};
pub use error::{
    AgentError, ConfigError, CoreError, ErrorCode, RuntimeError, ToolHandlerError,
};
pub use message::{Message, Role, ToolCall};
pub use protocol::{to_protocol_event, ProtocolSubscriber};
pub use registry::{
    AgentRegistry, HttpRuntimeClient, RuntimeClient, RuntimeConnectionStatus, RuntimeInfo,
    RuntimeTransport,
};
pub use run_handler::{RunAgentOptions, RunHandler};
pub use state_manager::StateManager;
pub use subscriber::{
    CoreEvent, CoreSubscriber, ErrorEvent, SubscriberSet, Subscription, ToolExecutionEndEvent,
    ToolExecutionStartEvent,
};
pub use suggestions::{
    DynamicSuggestionsConfig, StaticSuggestionsConfig, Suggestion, SuggestionAvailability,
    SuggestionEngine, SuggestionsConfig, SuggestionsState,
};
pub use tools::{handler_fn, FrontendTool, ToolDefinition, ToolHandler, ToolRegistry};

/// When running `cargo test -p ajora`, initializes tracing from `RUST_LOG` so that unit tests
/// in `src/**` can print logs with `--nocapture`.
#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
