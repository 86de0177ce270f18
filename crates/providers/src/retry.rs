//! Retrying gateway: bounded exponential backoff over any backend.
//!
//! Transient failures (timeouts, rate limits, network errors, HTTP 5xx) are
//! retried; fatal ones are surfaced immediately. Exhausting the attempt
//! budget turns the last transient error into a fatal
//! [`BackendError::RetriesExhausted`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stepwise_core::{Backend, BackendError, BackendSettings};
use tracing::{debug, warn};

/// How many times to try a prompt and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included. Always at least 1.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &BackendSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
        }
    }

    /// Delay before retry number `retry` (0-based): the initial backoff
    /// doubled per retry, capped at `max_backoff`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Delay after `err` on retry number `retry`; a rate limit's hint wins
    /// when it is longer, still capped at `max_backoff`.
    fn delay_after(&self, err: &BackendError, retry: u32) -> Duration {
        let base = self.delay_for(retry);
        match err {
            BackendError::RateLimited { retry_after_secs } => base
                .max(Duration::from_secs(*retry_after_secs))
                .min(self.max_backoff),
            _ => base,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&BackendSettings::default())
    }
}

/// Wraps a backend with the retry policy.
pub struct RetryingBackend {
    inner: Arc<dyn Backend>,
    policy: RetryPolicy,
}

impl RetryingBackend {
    pub fn new(inner: Arc<dyn Backend>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl Backend for RetryingBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let mut attempt = 1;
        loop {
            let err = match self.inner.generate(prompt).await {
                Ok(text) => {
                    debug!(backend = %self.inner.name(), attempt, reply_chars = text.len(), "Backend replied");
                    return Ok(text);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                warn!(backend = %self.inner.name(), error = %err, "Fatal backend error");
                return Err(err);
            }

            if attempt >= self.policy.max_attempts {
                warn!(
                    backend = %self.inner.name(),
                    attempts = attempt,
                    error = %err,
                    "Backend retries exhausted"
                );
                return Err(BackendError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.policy.delay_after(&err, attempt - 1);
            warn!(
                backend = %self.inner.name(),
                attempt,
                max_attempts = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient backend error, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
