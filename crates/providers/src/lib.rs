//! Backend Gateway for Stepwise.
//!
//! All backends implement the `stepwise_core::Backend` trait. Service
//! specifics (request shape, authentication, error surface) stay inside
//! each module; [`RetryingBackend`] adds bounded exponential backoff on
//! transient failures, and [`build_backend`] selects and wraps the
//! configured service.

mod http;

pub mod gemini;
pub mod ollama;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai_compat::OpenAiCompatBackend;
pub use retry::{RetryPolicy, RetryingBackend};
pub use router::build_backend;
