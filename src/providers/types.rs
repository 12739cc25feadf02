// Unified request/response types for multi-provider LLM support
//
// These types abstract over vendor formats (OpenAI, Claude, Zhipu) so the
// engines only ever see role-tagged text messages.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Speaker of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single role-tagged chat message sent to a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Unified request format for all providers
///
/// Each provider transforms this into its own wire format.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRequest {
    /// Conversation messages in order
    pub messages: Vec<ChatMessage>,

    /// Model name; empty means the provider default
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// System prompt (sent as `system` for Claude, prepended as a
    /// `{"role":"system"}` message for OpenAI-compatible providers)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Per-call timeout; `None` uses the provider default
    #[serde(skip)]
    pub timeout: Option<Duration>,

    /// Whether to stream the response
    #[serde(skip)]
    pub stream: bool,
}

impl ProviderRequest {
    /// Create a new request from messages
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: String::new(),
            max_tokens: crate::config::constants::DEFAULT_MAX_TOKENS,
            system: None,
            temperature: None,
            timeout: None,
            stream: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Token accounting reported by the vendor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Unified response format from providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Response ID (vendor-specific)
    pub id: String,

    /// Model that generated the response
    pub model: String,

    /// Completion text
    pub content: String,

    /// Why the model stopped generating
    pub finish_reason: Option<String>,

    pub usage: TokenUsage,

    /// Provider name (e.g., "openai", "claude", "zhipu")
    pub provider: String,
}

impl ProviderResponse {
    pub fn text(&self) -> &str {
        &self.content
    }
}

/// Stream chunk types for streaming responses
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Incremental text fragment
    TextDelta(String),
    /// End of stream marker from the vendor
    Done {
        finish_reason: Option<String>,
        usage: Option<TokenUsage>,
    },
}

/// Static catalogue entry for a vendor model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub max_tokens: u32,
    pub supports_streaming: bool,
    pub description: String,
}

impl ModelInfo {
    pub fn new(name: &str, max_tokens: u32, description: &str) -> Self {
        Self {
            name: name.to_string(),
            max_tokens,
            supports_streaming: true,
            description: description.to_string(),
        }
    }
}
