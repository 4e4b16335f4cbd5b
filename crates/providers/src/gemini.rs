//! Google Gemini gateway (Generative Language API).
//!
//! Sends the assembled prompt as a single user turn and asks for a JSON
//! response via `responseMimeType`.

use std::time::Duration;

use async_trait::async_trait;
use ragent_core::{GatewayError, ModelGateway, ModelReply};
use serde::Deserialize;
use tracing::debug;

use crate::check_status;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiGateway {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": self.temperature
            }
        })
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(response: GenerateResponse) -> Result<String, GatewayError> {
    let content = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .ok_or_else(|| GatewayError::Malformed("no candidates in response".into()))?;

    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.trim().is_empty() {
        return Err(GatewayError::Malformed("candidate has no text".into()));
    }
    Ok(text)
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<ModelReply, GatewayError> {
        if self.api_key.is_empty() {
            return Err(GatewayError::NotConfigured(
                "no API key for provider 'gemini'".into(),
            ));
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let response = check_status("gemini", response).await?;
        let body: GenerateResponse = response.json().await.map_err(|e| GatewayError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        ModelReply::parse(&candidate_text(body)?)
    }
}
