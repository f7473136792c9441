//! Suggested next messages per consumer agent.
//!
//! A [`SuggestionsConfig`] is either static (a fixed list) or dynamic (generated by a shadow
//! run of a provider agent). [`SuggestionEngine`] evaluates the configs that apply to an agent
//! and keeps the resulting list plus its loading state.

mod engine;
mod parse;

use serde::{Deserialize, Serialize};

pub use engine::SuggestionEngine;
pub use parse::{parse_suggestions, suggestion_tool_definition, SUGGESTION_TOOL_NAME};

/// Matches every consumer agent.
pub const ANY_AGENT: &str = "*";

pub const DEFAULT_PROVIDER_AGENT_ID: &str = "default";

/// When a config is offered, judged on the consumer's message count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionAvailability {
    /// Only while the conversation is empty.
    BeforeFirstMessage,
    #[default]
    AfterFirstMessage,
    Always,
    Disabled,
}

impl SuggestionAvailability {
    pub fn is_available(&self, message_count: usize) -> bool {
        match self {
            Self::BeforeFirstMessage => message_count == 0,
            Self::AfterFirstMessage => message_count > 0,
            Self::Always => true,
            Self::Disabled => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

impl Suggestion {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            message: message.into(),
            is_loading: false,
            icon: None,
        }
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }
}

fn default_min_suggestions() -> usize {
    1
}

fn default_max_suggestions() -> usize {
    3
}

fn default_provider() -> String {
    DEFAULT_PROVIDER_AGENT_ID.to_string()
}

fn default_consumer() -> String {
    ANY_AGENT.to_string()
}

fn before_first_message() -> SuggestionAvailability {
    SuggestionAvailability::BeforeFirstMessage
}

/// Suggestions produced by a shadow run of `provider_agent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicSuggestionsConfig {
    pub instructions: String,
    #[serde(default = "default_min_suggestions")]
    pub min_suggestions: usize,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    #[serde(default = "default_provider")]
    pub provider_agent_id: String,
    #[serde(default = "default_consumer")]
    pub consumer_agent_id: String,
    #[serde(default)]
    pub available: SuggestionAvailability,
}

impl DynamicSuggestionsConfig {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            min_suggestions: default_min_suggestions(),
            max_suggestions: default_max_suggestions(),
            provider_agent_id: default_provider(),
            consumer_agent_id: default_consumer(),
            available: SuggestionAvailability::default(),
        }
    }

    pub fn with_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_suggestions = min;
        self.max_suggestions = max.max(min);
        self
    }

    pub fn with_provider(mut self, agent_id: impl Into<String>) -> Self {
        self.provider_agent_id = agent_id.into();
        self
    }

    pub fn with_consumer(mut self, agent_id: impl Into<String>) -> Self {
        self.consumer_agent_id = agent_id.into();
        self
    }

    pub fn with_availability(mut self, available: SuggestionAvailability) -> Self {
        self.available = available;
        self
    }
}

/// A fixed list shown as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSuggestionsConfig {
    pub suggestions: Vec<Suggestion>,
    #[serde(default = "default_consumer")]
    pub consumer_agent_id: String,
    #[serde(default = "before_first_message")]
    pub available: SuggestionAvailability,
}

impl StaticSuggestionsConfig {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self {
            suggestions,
            consumer_agent_id: default_consumer(),
            available: before_first_message(),
        }
    }

    pub fn with_consumer(mut self, agent_id: impl Into<String>) -> Self {
        self.consumer_agent_id = agent_id.into();
        self
    }

    pub fn with_availability(mut self, available: SuggestionAvailability) -> Self {
        self.available = available;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SuggestionsConfig {
    Dynamic(DynamicSuggestionsConfig),
    Static(StaticSuggestionsConfig),
}

impl SuggestionsConfig {
    pub fn consumer_agent_id(&self) -> &str {
        match self {
            Self::Dynamic(c) => &c.consumer_agent_id,
            Self::Static(c) => &c.consumer_agent_id,
        }
    }

    pub fn available(&self) -> SuggestionAvailability {
        match self {
            Self::Dynamic(c) => c.available,
            Self::Static(c) => c.available,
        }
    }

    /// Consumer matches (`"*"` or exact) and the availability phase admits `message_count`.
    pub fn applies_to(&self, agent_id: &str, message_count: usize) -> bool {
        let consumer = self.consumer_agent_id();
        (consumer == ANY_AGENT || consumer == agent_id)
            && self.available().is_available(message_count)
    }
}

impl From<DynamicSuggestionsConfig> for SuggestionsConfig {
    fn from(config: DynamicSuggestionsConfig) -> Self {
        Self::Dynamic(config)
    }
}

impl From<StaticSuggestionsConfig> for SuggestionsConfig {
    fn from(config: StaticSuggestionsConfig) -> Self {
        Self::Static(config)
    }
}

/// Cached suggestions of one agent, as returned by [`SuggestionEngine::get_suggestions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionsState {
    pub suggestions: Vec<Suggestion>,
    pub is_loading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Scenario**: omitted fields take the documented defaults for each kind.
    #[test]
    fn config_defaults_from_json() {
        let dynamic: SuggestionsConfig =
            serde_json::from_value(json!({"kind": "dynamic", "instructions": "next steps"}))
                .unwrap();
        let SuggestionsConfig::Dynamic(d) = dynamic else {
            panic!("expected dynamic config");
        };
        assert_eq!((d.min_suggestions, d.max_suggestions), (1, 3));
        assert_eq!(d.provider_agent_id, "default");
        assert_eq!(d.consumer_agent_id, "*");
        assert_eq!(d.available, SuggestionAvailability::AfterFirstMessage);

        let fixed: SuggestionsConfig = serde_json::from_value(json!({
            "kind": "static",
            "suggestions": [{"title": "Hi", "message": "Say hi"}],
            "available": "always"
        }))
        .unwrap();
        assert_eq!(fixed.available(), SuggestionAvailability::Always);
        assert_eq!(fixed.consumer_agent_id(), "*");
    }

    #[test]
    fn availability_phases() {
        use SuggestionAvailability::*;
        assert!(BeforeFirstMessage.is_available(0));
        assert!(!BeforeFirstMessage.is_available(1));
        assert!(!AfterFirstMessage.is_available(0));
        assert!(AfterFirstMessage.is_available(2));
        assert!(Always.is_available(0));
        assert!(!Disabled.is_available(5));
    }

    /// **Scenario**: consumer matching accepts the wildcard and exact ids only.
    #[test]
    fn applies_to_consumer() {
        let any: SuggestionsConfig = StaticSuggestionsConfig::new(vec![]).into();
        let scoped: SuggestionsConfig = StaticSuggestionsConfig::new(vec![])
            .with_consumer("writer")
            .into();
        assert!(any.applies_to("research", 0));
        assert!(scoped.applies_to("writer", 0));
        assert!(!scoped.applies_to("research", 0));
        assert!(!scoped.applies_to("writer", 3));
    }
}
