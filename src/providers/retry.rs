// Retry logic with exponential backoff

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::time::sleep;

use super::types::{ModelInfo, ProviderRequest, ProviderResponse, StreamChunk};
use super::{LlmProvider, ProviderResult};
use crate::config::RetrySettings;

/// Bounded attempts with `base_delay * 2^attempt` between them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
        )
    }
}

/// Execute a function with exponential backoff retry logic
///
/// Only errors whose `is_retryable()` is true are retried.
pub async fn with_retry<F, Fut, T>(policy: RetryPolicy, f: F) -> ProviderResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = ProviderResult<T>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "Request failed (attempt {}/{}, {}), retrying in {:?}",
                    attempt + 1,
                    policy.max_attempts,
                    e.kind(),
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Provider decorator applying a retry policy to every call
///
/// For streams only establishing the connection is retried; fragments
/// already delivered are never replayed.
pub struct RetryingProvider {
    inner: Arc<dyn LlmProvider>,
    policy: RetryPolicy,
}

impl RetryingProvider {
    pub fn new(inner: Arc<dyn LlmProvider>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LlmProvider for RetryingProvider {
    async fn chat_completion(&self, request: &ProviderRequest) -> ProviderResult<ProviderResponse> {
        with_retry(self.policy, || self.inner.chat_completion(request)).await
    }

    async fn chat_completion_stream(
        &self,
        request: &ProviderRequest,
    ) -> ProviderResult<Receiver<ProviderResult<StreamChunk>>> {
        with_retry(self.policy, || self.inner.chat_completion_stream(request)).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    fn models(&self) -> Vec<ModelInfo> {
        self.inner.models()
    }

    fn supports_streaming(&self) -> bool {
        self.inner.supports_streaming()
    }
}
