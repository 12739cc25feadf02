// Claude Messages API provider

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::sse::{self, SseBuffer};
use super::types::{ModelInfo, ProviderRequest, ProviderResponse, Role, StreamChunk, TokenUsage};
use super::{LlmProvider, ProviderResult};
use crate::config::constants::DEFAULT_TIMEOUT_SECS;
use crate::config::ProviderKind;
use crate::error::ProviderError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "claude";

pub struct ClaudeProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl ClaudeProvider {
    pub fn new(api_key: String) -> ProviderResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config("claude API key is empty".to_string()));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: ProviderKind::Claude.default_base_url().to_string(),
            default_model: ProviderKind::Claude.default_model().to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Claude takes the system prompt as a top-level field, so any
    /// system-role messages are folded into it.
    fn to_claude_request(&self, request: &ProviderRequest, stream: bool) -> ClaudeRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut system_parts: Vec<&str> = Vec::new();
        if let Some(system) = &request.system {
            system_parts.push(system);
        }

        let mut messages = Vec::with_capacity(request.messages.len());
        for msg in &request.messages {
            match msg.role {
                Role::System => system_parts.push(&msg.content),
                Role::User | Role::Assistant => messages.push(ClaudeMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        ClaudeRequest {
            model,
            max_tokens: request.max_tokens,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
            temperature: request.temperature,
            stream,
        }
    }

    async fn post(&self, request: &ProviderRequest, stream: bool) -> ProviderResult<reqwest::Response> {
        let body = self.to_claude_request(request, stream);
        let timeout = request.timeout.unwrap_or(self.timeout);

        tracing::debug!("Sending request to Claude API: model={}", body.model);

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER_NAME, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                PROVIDER_NAME,
                status.as_u16(),
                error_body,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for ClaudeProvider {
    async fn chat_completion(&self, request: &ProviderRequest) -> ProviderResult<ProviderResponse> {
        let started = Instant::now();
        let timeout = request.timeout.unwrap_or(self.timeout);
        let response = self.post(request, false).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER_NAME, timeout, e))?;
        let parsed: ClaudeResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.to_string(),
                message: format!("{} (body: {})", e, body),
            })?;

        let content = parsed
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(
            provider = PROVIDER_NAME,
            model = %parsed.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion finished"
        );

        Ok(ProviderResponse {
            id: parsed.id,
            model: parsed.model,
            content,
            finish_reason: parsed.stop_reason,
            usage: parsed
                .usage
                .map(|u| TokenUsage::new(u.input_tokens, u.output_tokens))
                .unwrap_or_default(),
            provider: PROVIDER_NAME.to_string(),
        })
    }

    async fn chat_completion_stream(
        &self,
        request: &ProviderRequest,
    ) -> ProviderResult<mpsc::Receiver<ProviderResult<StreamChunk>>> {
        let response = self.post(request, true).await?;
        let (tx, rx) = mpsc::channel(100);
        let timeout = request.timeout.unwrap_or(self.timeout);

        tokio::spawn(async move {
            let mut stream = response.bytes_stream();
            let mut sse = SseBuffer::new();
            let mut finish_reason: Option<String> = None;
            let mut input_tokens = 0u32;
            let mut output_tokens = 0u32;
            let mut terminated = false;

            'outer: while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!("Stream error: {}", e);
                        let _ = tx
                            .send(Err(ProviderError::from_transport(PROVIDER_NAME, timeout, e)))
                            .await;
                        return;
                    }
                };
                sse.push(&bytes);

                while let Some(data) = sse.next_data() {
                    let event = match serde_json::from_str::<ClaudeStreamEvent>(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::debug!("Skipping unparseable stream line: {}", e);
                            continue;
                        }
                    };

                    match event {
                        ClaudeStreamEvent::MessageStart { message } => {
                            if let Some(usage) = message.usage {
                                input_tokens = usage.input_tokens;
                            }
                        }
                        ClaudeStreamEvent::ContentBlockDelta { delta } => {
                            if let Some(text) = delta.text.filter(|t| !t.is_empty()) {
                                if tx.send(Ok(StreamChunk::TextDelta(text))).await.is_err() {
                                    return;
                                }
                            }
                        }
                        ClaudeStreamEvent::MessageDelta { delta, usage } => {
                            if delta.stop_reason.is_some() {
                                finish_reason = delta.stop_reason;
                            }
                            if let Some(usage) = usage {
                                output_tokens = usage.output_tokens;
                            }
                        }
                        ClaudeStreamEvent::MessageStop => {
                            terminated = true;
                            break 'outer;
                        }
                        ClaudeStreamEvent::Error { error } => {
                            let _ = tx
                                .send(Err(ProviderError::MalformedResponse {
                                    provider: PROVIDER_NAME.to_string(),
                                    message: error.to_string(),
                                }))
                                .await;
                            return;
                        }
                        ClaudeStreamEvent::Other => {}
                    }
                }
            }

            if !terminated {
                tracing::warn!("{} stream closed without message_stop", PROVIDER_NAME);
                let _ = tx.send(Err(sse::truncated(PROVIDER_NAME))).await;
                return;
            }

            let _ = tx
                .send(Ok(StreamChunk::Done {
                    finish_reason,
                    usage: Some(TokenUsage::new(input_tokens, output_tokens)),
                }))
                .await;
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo::new("claude-3-haiku-20240307", 200_000, "Fastest, lowest cost"),
            ModelInfo::new("claude-3-sonnet-20240229", 200_000, "Balanced default"),
            ModelInfo::new("claude-3-opus-20240229", 200_000, "Most capable"),
        ]
    }
}

// Messages API wire types

#[derive(Debug, Clone, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Clone, Serialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    content: Vec<ClaudeContentBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaudeContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ClaudeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeStreamEvent {
    MessageStart {
        message: ClaudeStreamMessage,
    },
    ContentBlockDelta {
        delta: ClaudeTextDelta,
    },
    MessageDelta {
        delta: ClaudeMessageDelta,
        #[serde(default)]
        usage: Option<ClaudeUsage>,
    },
    MessageStop,
    Error {
        error: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaudeStreamMessage {
    #[serde(default)]
    usage: Option<ClaudeUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaudeTextDelta {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClaudeMessageDelta {
    #[serde(default)]
    stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::ChatMessage;

    #[test]
    fn test_client_creation() {
        let provider = ClaudeProvider::new("sk-ant-test".to_string());
        assert!(provider.is_ok());
    }

    #[test]
    fn test_system_messages_folded_into_system_field() {
        let provider = ClaudeProvider::new("sk-ant-test".to_string()).unwrap();
        let request = ProviderRequest::new(vec![
            ChatMessage::system("extra rules"),
            ChatMessage::user("hello"),
        ])
        .with_system("You are Dr. Lin");

        let wire = provider.to_claude_request(&request, false);
        assert_eq!(wire.system.as_deref(), Some("You are Dr. Lin\n\nextra rules"));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
        assert_eq!(wire.model, "claude-3-sonnet-20240229");
    }

    #[test]
    fn test_stream_event_parsing() {
        let delta: ClaudeStreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        )
        .unwrap();
        assert!(matches!(
            delta,
            ClaudeStreamEvent::ContentBlockDelta { delta } if delta.text.as_deref() == Some("Hi")
        ));

        let ping: ClaudeStreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, ClaudeStreamEvent::Other));
    }
}
