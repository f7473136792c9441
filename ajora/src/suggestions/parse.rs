//! The structured tool call a provider answers with, and how to read it back.

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::message::Message;
use crate::suggestions::Suggestion;
use crate::tools::ToolDefinition;

/// The only tool offered to a suggestion shadow run.
pub const SUGGESTION_TOOL_NAME: &str = "ajoraSuggestion";

/// Schema of the suggestion tool; the array is bounded to `min..=max` entries.
pub fn suggestion_tool_definition(min: usize, max: usize) -> ToolDefinition {
    ToolDefinition {
        name: SUGGESTION_TOOL_NAME.to_string(),
        description: Some("Suggest what the user could say next.".to_string()),
        parameters: json!({
            "type": "object",
            "properties": {
                "suggestions": {
                    "type": "array",
                    "minItems": min,
                    "maxItems": max,
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": {
                                "type": "string",
                                "description": "Short label shown on the suggestion chip"
                            },
                            "message": {
                                "type": "string",
                                "description": "Message sent when the suggestion is picked"
                            }
                        },
                        "required": ["title", "message"]
                    }
                }
            },
            "required": ["suggestions"]
        }),
    }
}

#[derive(Deserialize)]
struct SuggestionArgs {
    suggestions: Vec<SuggestionItem>,
}

#[derive(Deserialize)]
struct SuggestionItem {
    title: String,
    message: String,
}

/// Reads the last `ajoraSuggestion` call in `messages`, keeping at most `max` entries.
/// A missing or malformed call yields an empty list.
pub fn parse_suggestions(messages: &[Message], max: usize) -> Vec<Suggestion> {
    let Some(call) = messages
        .iter()
        .flat_map(|m| m.tool_calls())
        .filter(|c| c.name() == SUGGESTION_TOOL_NAME)
        .last()
    else {
        debug!("provider produced no suggestion tool call");
        return Vec::new();
    };
    match serde_json::from_str::<SuggestionArgs>(&call.function.arguments) {
        Ok(args) => args
            .suggestions
            .into_iter()
            .take(max)
            .map(|item| Suggestion::new(item.title, item.message))
            .collect(),
        Err(err) => {
            debug!(tool_call_id = %call.id, error = %err, "unparseable suggestion arguments");
            Vec::new()
        }
    }
}
