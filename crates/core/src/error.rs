//! Error types for the Stepwise domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] unifies them.

use thiserror::Error;

/// The top-level error type for Stepwise operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Run state errors ---
    #[error("Run state error: {0}")]
    State(#[from] StateError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures surfaced by a language-model backend.
///
/// The taxonomy splits into *transient* failures, which the gateway retries
/// with backoff, and *fatal* ones, which end the current run.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed request: {0}")]
    InvalidRequest(String),

    #[error("Unsupported parameter: {0}")]
    UnsupportedParameter(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Backend returned an unusable response: {0}")]
    InvalidResponse(String),

    #[error("Backend not configured: {0}")]
    NotConfigured(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<BackendError>,
    },
}

impl BackendError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }

    /// Classify a non-success HTTP status into the backend taxonomy.
    pub fn from_status(status_code: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status_code {
            401 | 403 => Self::AuthenticationFailed(body),
            404 => Self::ModelNotFound(body),
            408 => Self::Timeout(body),
            429 => Self::RateLimited {
                retry_after_secs: 5,
            },
            400 | 422 => Self::InvalidRequest(body),
            _ => Self::Api {
                status_code,
                message: body,
            },
        }
    }
}

/// Failures of a single tool dispatch.
///
/// None of these end a run: the loop records them as an observation.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// Unknown tool, or a dangerous tool while dangerous tools are disabled.
    /// Both cases share this variant on purpose.
    #[error("Tool not available: {0}")]
    NotAvailable(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    #[error("Invalid tool input: {0}")]
    InvalidInput(String),
}

/// Violations of the run lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("Run already finished with status '{0}'")]
    AlreadyTerminal(String),

    #[error("Cannot finish a run with a non-terminal status")]
    NotTerminal,
}
