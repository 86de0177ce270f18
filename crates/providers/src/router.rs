//! Backend selection: builds the configured service and wraps it in the
//! retrying gateway.

use std::sync::Arc;

use stepwise_core::{Backend, BackendError, BackendKind, RunConfig};
use tracing::info;

use crate::gemini::GeminiBackend;
use crate::ollama::OllamaBackend;
use crate::openai_compat::OpenAiCompatBackend;
use crate::retry::{RetryPolicy, RetryingBackend};

/// Build the backend gateway described by `config`.
///
/// Fails with [`BackendError::NotConfigured`] when the selected service
/// lacks what it needs to make a request (an API key, usually).
pub fn build_backend(config: &RunConfig) -> Result<Arc<dyn Backend>, BackendError> {
    let settings = &config.backend;
    let inner: Arc<dyn Backend> = match settings.kind {
        BackendKind::OpenAi => {
            // A custom base URL may point at a keyless compatible server.
            if settings.api_key.is_none() && settings.base_url.is_none() {
                return Err(BackendError::NotConfigured(
                    "OpenAI requires an API key (set backend.api_key or OPENAI_API_KEY)".into(),
                ));
            }
            Arc::new(OpenAiCompatBackend::openai(settings)?)
        }
        BackendKind::Ollama => Arc::new(OllamaBackend::new(settings)?),
        BackendKind::Gemini => Arc::new(GeminiBackend::new(settings)?),
    };

    let policy = RetryPolicy::from_settings(settings);
    info!(
        backend = %inner.name(),
        model = %inner.model(),
        max_attempts = policy.max_attempts,
        "Backend gateway ready"
    );
    Ok(Arc::new(RetryingBackend::new(inner, policy)))
}
