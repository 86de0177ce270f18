//! Backend trait: the abstraction over language-model services.
//!
//! A backend takes the fully serialized prompt for one REASONING step and
//! returns the model's raw text. Request/response shapes, authentication,
//! and error surfaces differ per service; callers only see this trait.
//!
//! Implementations: OpenAI-compatible, Ollama, Gemini, and the retrying
//! gateway wrapper in `stepwise-providers`.

use async_trait::async_trait;

use crate::error::BackendError;

/// The core Backend trait.
///
/// The loop controller calls [`Backend::generate`] without knowing which
/// service answers.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// The model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Send a serialized prompt and get the generated text back.
    async fn generate(&self, prompt: &str) -> std::result::Result<String, BackendError>;
}
