// Multi-provider LLM support
//
// This module provides an abstraction layer over hosted chat-completion
// APIs (OpenAI, Claude, Zhipu). The active vendor is chosen from config at
// startup; everything else talks to `dyn LlmProvider`.

use async_trait::async_trait;
use tokio::sync::mpsc::Receiver;

use crate::error::ProviderError;

pub mod types;

// Provider implementations
pub mod claude;
pub mod openai;

pub mod factory;
pub mod retry;
pub mod sse;

pub use claude::ClaudeProvider;
pub use factory::{create_provider, create_provider_for};
pub use openai::OpenAIProvider;
pub use retry::{with_retry, RetryPolicy, RetryingProvider};
pub use types::{
    ChatMessage, ModelInfo, ProviderRequest, ProviderResponse, Role, StreamChunk, TokenUsage,
};

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Trait for LLM providers
///
/// All vendors implement this trait, providing a unified interface for
/// one-shot completions and streamed responses.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request and wait for the full completion
    async fn chat_completion(&self, request: &ProviderRequest) -> ProviderResult<ProviderResponse>;

    /// Send a request and stream the response
    ///
    /// The channel yields text fragments as they arrive and is closed when
    /// the stream ends. Dropping the receiver stops consumption; the remote
    /// side is not notified.
    async fn chat_completion_stream(
        &self,
        request: &ProviderRequest,
    ) -> ProviderResult<Receiver<ProviderResult<StreamChunk>>>;

    /// Provider name (e.g., "openai", "claude", "zhipu")
    fn name(&self) -> &str;

    /// Model used when the request leaves `model` empty
    fn default_model(&self) -> &str;

    /// Static model catalogue for this vendor
    fn models(&self) -> Vec<ModelInfo>;

    fn supports_streaming(&self) -> bool {
        true
    }

    /// Cheap round trip to check credentials and connectivity
    async fn validate_connection(&self) -> ProviderResult<()> {
        let request = ProviderRequest::new(vec![ChatMessage::user("ping")]).with_max_tokens(5);
        self.chat_completion(&request).await.map(|_| ())
    }
}
