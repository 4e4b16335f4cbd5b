//! Prompt assembly: renders one turn's state into the model prompt.
//!
//! The prompt is a single JSON document with six parts:
//!
//! 1. **system**: the fixed instruction
//! 2. **messages**: the session window, each entry truncated, then the
//!    current message in full
//! 3. **tools**: advertised tool schemas, in registry order
//! 4. **toolCallResponse**: every tool result gathered so far this turn
//! 5. **context**: retrieved documents
//! 6. **response_format**: the reply contract: `tool_calls` or `response`
//!
//! # Determinism
//!
//! Assembly reads the session window and nothing else: identical inputs
//! always render to identical bytes. Execution timings are stripped from
//! tool results before rendering.

use ragent_core::{ContextDocument, Event, Role, ToolCallResult, ToolDefinition};
use ragent_memory::SessionStore;
use serde::Serialize;

/// Marker appended to history entries cut at the character limit.
pub const TRUNCATION_MARKER: &str = "...";

/// One chat history entry as the model sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// The assembled prompt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub system: String,
    pub messages: Vec<PromptMessage>,
    pub tools: Vec<ToolDefinition>,
    #[serde(rename = "toolCallResponse")]
    pub tool_call_response: Vec<ToolCallResult>,
    pub context: Vec<ContextDocument>,
    pub response_format: serde_json::Value,
}

impl Prompt {
    /// Render as pretty-printed JSON (two-space indent).
    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Builds prompts from session state and per-turn inputs.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
    tools: Vec<ToolDefinition>,
    history_char_limit: usize,
}

impl PromptAssembler {
    pub fn new(
        system_prompt: impl Into<String>,
        tools: Vec<ToolDefinition>,
        history_char_limit: usize,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            tools,
            history_char_limit: history_char_limit.max(1),
        }
    }

    /// Change the per-entry character limit for history.
    pub fn with_history_char_limit(mut self, limit: usize) -> Self {
        self.history_char_limit = limit.max(1);
        self
    }

    /// Assemble the prompt for one model call.
    ///
    /// When the session window already ends with the current message as a
    /// user event, that entry is not repeated: the message always appears
    /// exactly once, last and untruncated.
    pub fn build(
        &self,
        store: &SessionStore,
        session_id: &str,
        message: &str,
        context: &[ContextDocument],
        tool_results: &[ToolCallResult],
    ) -> Prompt {
        let mut window = store.events(session_id);
        if window
            .last()
            .is_some_and(|e| e.role == Role::User && e.content == message)
        {
            window.pop();
        }

        let mut messages: Vec<PromptMessage> = window
            .iter()
            .map(|event| self.history_entry(event))
            .collect();
        messages.push(PromptMessage {
            role: Role::User,
            content: message.to_string(),
        });

        let tool_call_response = tool_results
            .iter()
            .cloned()
            .map(|mut r| {
                r.execution_time_ms = None;
                r
            })
            .collect();

        Prompt {
            system: self.system_prompt.clone(),
            messages,
            tools: self.tools.clone(),
            tool_call_response,
            context: context.to_vec(),
            response_format: response_format(),
        }
    }

    fn history_entry(&self, event: &Event) -> PromptMessage {
        PromptMessage {
            role: event.role,
            content: truncate(&event.content, self.history_char_limit),
        }
    }
}

fn truncate(content: &str, limit: usize) -> String {
    match content.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &content[..cut]),
        None => content.to_string(),
    }
}

/// JSON schema for the reply: exactly one of `tool_calls` or `response`.
pub fn response_format() -> serde_json::Value {
    serde_json::json!({
        "type": "json_schema",
        "json_schema": {
            "name": "assistant_response",
            "schema": {
                "type": "object",
                "oneOf": [
                    {
                        "properties": {
                            "tool_calls": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "tool_name": { "type": "string" },
                                        "args": { "type": "object" }
                                    },
                                    "required": ["tool_name", "args"]
                                }
                            }
                        },
                        "required": ["tool_calls"]
                    },
                    {
                        "properties": {
                            "response": { "type": "string" }
                        },
                        "required": ["response"]
                    }
                ]
            }
        }
    })
}
