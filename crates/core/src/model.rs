//! Model gateway: the abstraction over the generative model.
//!
//! The gateway receives the fully assembled prompt as one string and returns
//! the model's structured answer: either a list of tool calls or a final
//! response. Transport, authentication and vendor wire formats stay behind
//! the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::tool::ToolCallRequest;

/// The raw structured output of one generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// What the loop controller should do next with a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStep {
    /// Execute these tool calls and ask the model again.
    ToolCalls(Vec<ToolCallRequest>),
    /// The turn is answered.
    Final(String),
}

impl ModelReply {
    /// A reply carrying only a final answer.
    pub fn response(text: impl Into<String>) -> Self {
        Self {
            tool_calls: None,
            response: Some(text.into()),
        }
    }

    /// A reply carrying only tool calls.
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: Some(calls),
            response: None,
        }
    }

    /// Parse the model's text output.
    ///
    /// The output must be a JSON object. Models occasionally wrap JSON in a
    /// Markdown code fence even when asked not to, so one surrounding fence
    /// is stripped before parsing.
    pub fn parse(text: &str) -> Result<Self, GatewayError> {
        let body = strip_code_fence(text.trim());
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| GatewayError::Malformed(format!("model output is not JSON: {e}")))?;

        if !value.is_object() {
            return Err(GatewayError::Malformed(
                "model output must be a JSON object".into(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| GatewayError::Malformed(format!("unexpected reply shape: {e}")))
    }

    /// Classify the reply.
    ///
    /// A non-empty `tool_calls` list wins; otherwise a `response` string is
    /// required. A reply with neither is malformed.
    pub fn into_step(self) -> Result<ModelStep, GatewayError> {
        match (self.tool_calls, self.response) {
            (Some(calls), _) if !calls.is_empty() => Ok(ModelStep::ToolCalls(calls)),
            (_, Some(text)) => Ok(ModelStep::Final(text)),
            _ => Err(GatewayError::Malformed(
                "reply carries neither tool_calls nor response".into(),
            )),
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// The core model gateway trait.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// The gateway name (e.g., "gemini", "openai").
    fn name(&self) -> &str;

    /// Generate a reply for a fully assembled prompt.
    async fn generate(&self, prompt: &str) -> Result<ModelReply, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_final_response() {
        let reply = ModelReply::parse(r#"{"response": "Hello"}"#).unwrap();
        assert_eq!(reply.into_step().unwrap(), ModelStep::Final("Hello".into()));
    }

    #[test]
    fn parse_tool_calls() {
        let reply = ModelReply::parse(
            r#"{"tool_calls": [{"tool_name": "math_tool", "args": {"expression": "2+2"}}]}"#,
        )
        .unwrap();
        match reply.into_step().unwrap() {
            ModelStep::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].tool_name, "math_tool");
                assert_eq!(calls[0].args["expression"], "2+2");
            }
            other => panic!("expected tool calls, got {other:?}"),
        }
    }

    #[test]
    fn parse_fenced_json() {
        let text = "```json\n{\"response\": \"fenced\"}\n```";
        let reply = ModelReply::parse(text).unwrap();
        assert_eq!(reply.response.as_deref(), Some("fenced"));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = ModelReply::parse("Sure! The answer is 4.").unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));
    }

    #[test]
    fn json_array_is_malformed() {
        let err = ModelReply::parse("[1, 2]").unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));
    }

    #[test]
    fn empty_tool_calls_fall_back_to_response() {
        let reply = ModelReply {
            tool_calls: Some(vec![]),
            response: Some("done".into()),
        };
        assert_eq!(reply.into_step().unwrap(), ModelStep::Final("done".into()));
    }

    #[test]
    fn neither_field_is_malformed() {
        let err = ModelReply::default().into_step().unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));

        let err = ModelReply::tool_calls(vec![]).into_step().unwrap_err();
        assert!(matches!(err, GatewayError::Malformed(_)));
    }
}
