//! HTTP plumbing shared by the service backends.

use std::time::Duration;

use stepwise_core::BackendError;
use tracing::warn;

/// Build a client with the configured per-request timeout.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::NotConfigured(format!("Failed to create HTTP client: {e}")))
}

/// Classify a transport failure.
pub(crate) fn send_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else {
        BackendError::Network(err.to_string())
    }
}

/// Pass a successful response through; turn anything else into a
/// classified [`BackendError`] carrying the response body.
pub(crate) async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response.text().await.unwrap_or_default();
    warn!(backend, status = status.as_u16(), body = %preview(&body), "Backend returned error");

    Err(match BackendError::from_status(status.as_u16(), body) {
        BackendError::RateLimited { retry_after_secs } => BackendError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(retry_after_secs),
        },
        err => err,
    })
}

/// Decode a JSON body, mapping failures to `InvalidResponse`.
pub(crate) async fn json_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, BackendError> {
    response
        .json()
        .await
        .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {e}")))
}

/// First 100 characters of `text`, for logs.
pub(crate) fn preview(text: &str) -> String {
    text.chars().take(100).collect()
}
