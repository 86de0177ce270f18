//! Ollama backend (`/api/generate`, non-streaming).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stepwise_core::{Backend, BackendError, BackendSettings};
use tracing::debug;

use crate::http;

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// A local Ollama server.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    stop: Vec<String>,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let base_url = settings.base_url.as_deref().unwrap_or(OLLAMA_BASE_URL);
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            stop: settings.stop.clone(),
            client: http::build_client(settings.request_timeout)?,
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
                stop: self.stop.iter().map(String::as_str).collect(),
            },
        }
    }

    fn extract_text(response: GenerateResponse) -> Result<String, BackendError> {
        if let Some(error) = response.error {
            return Err(BackendError::InvalidResponse(error));
        }
        match response.response {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(BackendError::InvalidResponse(
                "Ollama returned an empty response".into(),
            )),
        }
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending generate request to Ollama");

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(http::send_error)?;

        let response = match http::check_status("ollama", response).await {
            Err(BackendError::ModelNotFound(body)) => {
                return Err(BackendError::ModelNotFound(format!(
                    "'{}' is not available on the Ollama server (pull it first): {body}",
                    self.model
                )));
            }
            other => other?,
        };
        let body: GenerateResponse = http::json_body(response).await?;
        Self::extract_text(body)
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions<'a>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions<'a> {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
