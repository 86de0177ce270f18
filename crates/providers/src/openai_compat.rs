//! OpenAI-compatible backend.
//!
//! Works with OpenAI and any endpoint exposing `/v1/chat/completions`
//! (OpenRouter, vLLM, llama.cpp server, ...). The serialized prompt is sent
//! as a single user message; the reply text is the first choice's content.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stepwise_core::{Backend, BackendError, BackendSettings};
use tracing::debug;

use crate::http;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible chat completions backend.
pub struct OpenAiCompatBackend {
    name: String,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    stop: Vec<String>,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a backend talking to `base_url` with the given settings.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        settings: &BackendSettings,
    ) -> Result<Self, BackendError> {
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stop: settings.stop.clone(),
            client: http::build_client(settings.request_timeout)?,
        })
    }

    /// Create an OpenAI backend (convenience constructor).
    ///
    /// Honors `settings.base_url` for compatible endpoints.
    pub fn openai(settings: &BackendSettings) -> Result<Self, BackendError> {
        let base_url = settings.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        Self::new("openai", base_url, settings)
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            // The API accepts at most four stop sequences.
            stop: self.stop.iter().take(4).map(String::as_str).collect(),
            stream: false,
        }
    }

    fn extract_text(response: ChatResponse) -> Result<String, BackendError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::InvalidResponse("No choices in response".into()))?;

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(BackendError::InvalidResponse(format!(
                "Empty completion (finish_reason: {})",
                choice.finish_reason.as_deref().unwrap_or("unknown")
            ))),
        }
    }
}

#[async_trait]
impl Backend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(backend = %self.name, model = %self.model, prompt_chars = prompt.len(), "Sending completion request");

        let mut request = self.client.post(&url).json(&self.request_body(prompt));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(http::send_error)?;
        let response = http::check_status(&self.name, response).await?;
        let body: ChatResponse = http::json_body(response).await?;
        Self::extract_text(body)
    }
}

// --- OpenAI API types ---

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
