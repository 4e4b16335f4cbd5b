//! OpenAI-compatible gateway implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions` with `response_format: json_object`.

use std::time::Duration;

use async_trait::async_trait;
use ragent_core::{GatewayError, ModelGateway, ModelReply};
use serde::Deserialize;
use tracing::debug;

use crate::check_status;

/// An OpenAI-compatible model gateway.
///
/// The whole prompt travels as one user message; the reply content is
/// expected to be the JSON reply object.
pub struct OpenAiCompatGateway {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatGateway {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            client,
        })
    }

    /// Create an OpenAI gateway (convenience constructor).
    pub fn openai(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an Ollama gateway (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Result<Self, GatewayError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "stream": false,
        })
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: Option<String>,
}

fn first_choice_content(response: ApiResponse) -> Result<String, GatewayError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| GatewayError::Malformed("No choices in response".into()))
}

#[async_trait]
impl ModelGateway for OpenAiCompatGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<ModelReply, GatewayError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let response = check_status(&self.name, response).await?;
        let api_response: ApiResponse =
            response.json().await.map_err(|e| GatewayError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        ModelReply::parse(&first_choice_content(api_response)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_shape() {
        let gateway = OpenAiCompatGateway::openai("sk-test", "gpt-4o-mini").unwrap();
        let body = gateway.request_body("prompt text");

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "prompt text");
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn parses_tool_call_content() {
        let resp: ApiResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "{\"tool_calls\":[{\"tool_name\":\"weather_tool\",\"args\":{\"location\":\"Rome\"}}]}"
                }
            }]
        }))
        .unwrap();

        let reply = ModelReply::parse(&first_choice_content(resp).unwrap()).unwrap();
        let calls = reply.tool_calls.unwrap();
        assert_eq!(calls[0].tool_name, "weather_tool");
        assert_eq!(calls[0].args["location"], "Rome");
    }

    #[test]
    fn empty_choices_is_malformed() {
        let resp: ApiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            first_choice_content(resp),
            Err(GatewayError::Malformed(_))
        ));
    }

    #[test]
    fn ollama_defaults() {
        let gateway = OpenAiCompatGateway::ollama(None, "llama3").unwrap();
        assert_eq!(gateway.name(), "ollama");
        assert_eq!(gateway.base_url, "http://localhost:11434/v1");
    }
}
