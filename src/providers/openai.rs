// OpenAI-compatible provider implementation
//
// Serves both OpenAI and Zhipu GLM, which accept the same chat-completions
// wire format under different base URLs and paths.

use async_trait::async_trait;
use futures::stream::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use super::sse::{self, SseBuffer, DONE_MARKER};
use super::types::{
    ChatMessage, ModelInfo, ProviderRequest, ProviderResponse, StreamChunk, TokenUsage,
};
use super::{LlmProvider, ProviderResult};
use crate::config::constants::DEFAULT_TIMEOUT_SECS;
use crate::config::ProviderKind;
use crate::error::ProviderError;

/// OpenAI-compatible chat-completions provider
#[derive(Clone)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    chat_path: &'static str,
    default_model: String,
    provider_name: String,
    timeout: Duration,
    catalog: Vec<ModelInfo>,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider
    pub fn new_openai(api_key: String) -> ProviderResult<Self> {
        Self::new(
            api_key,
            ProviderKind::Openai.default_base_url().to_string(),
            "/v1/chat/completions",
            ProviderKind::Openai,
            vec![
                ModelInfo::new("gpt-3.5-turbo", 4096, "Fast, inexpensive general model"),
                ModelInfo::new("gpt-4", 8192, "Stronger reasoning, slower"),
                ModelInfo::new("gpt-4-turbo", 128_000, "GPT-4 with a long context window"),
            ],
        )
    }

    /// Create a new Zhipu GLM provider (OpenAI-compatible API)
    pub fn new_zhipu(api_key: String) -> ProviderResult<Self> {
        Self::new(
            api_key,
            ProviderKind::Zhipu.default_base_url().to_string(),
            "/api/paas/v4/chat/completions",
            ProviderKind::Zhipu,
            vec![
                ModelInfo::new("glm-4", 128_000, "General flagship model"),
                ModelInfo::new("glm-4-flash", 128_000, "Low latency, free tier"),
                ModelInfo::new("glm-4-air", 128_000, "Balanced cost and quality"),
                ModelInfo::new("glm-4-long", 1_000_000, "Very long context"),
            ],
        )
    }

    /// Set custom model for this provider
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Point at a different host (proxies, mock servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Default per-call timeout when the request carries none
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn new(
        api_key: String,
        base_url: String,
        chat_path: &'static str,
        kind: ProviderKind,
        catalog: Vec<ModelInfo>,
    ) -> ProviderResult<Self> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config(format!(
                "{} API key is empty",
                kind.as_str()
            )));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url,
            chat_path,
            default_model: kind.default_model().to_string(),
            provider_name: kind.as_str().to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            catalog,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, self.chat_path)
    }

    /// Convert ProviderRequest to the chat-completions format
    fn to_openai_request(&self, request: &ProviderRequest) -> OpenAIRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let mut messages: Vec<OpenAIMessage> = Vec::with_capacity(request.messages.len() + 1);

        // System prompt goes first as a {"role":"system"} message
        if let Some(system) = &request.system {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }

        messages.extend(request.messages.iter().map(|m: &ChatMessage| OpenAIMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));

        OpenAIRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            stream: request.stream,
        }
    }

    fn from_openai_response(&self, response: OpenAIResponse) -> ProviderResult<ProviderResponse> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::MalformedResponse {
                provider: self.provider_name.clone(),
                message: "response contained no choices".to_string(),
            }
        })?;

        let usage = response
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(ProviderResponse {
            id: response.id.unwrap_or_default(),
            model: response.model,
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage,
            provider: self.provider_name.clone(),
        })
    }

    async fn post(&self, request: &ProviderRequest, stream: bool) -> ProviderResult<reqwest::Response> {
        let mut body = self.to_openai_request(request);
        body.stream = stream;
        let timeout = request.timeout.unwrap_or(self.timeout);

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json")
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&self.provider_name, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(
                &self.provider_name,
                status.as_u16(),
                error_body,
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    async fn chat_completion(&self, request: &ProviderRequest) -> ProviderResult<ProviderResponse> {
        let started = Instant::now();
        let timeout = request.timeout.unwrap_or(self.timeout);
        let response = self.post(request, false).await?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&self.provider_name, timeout, e))?;
        let parsed: OpenAIResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::MalformedResponse {
                provider: self.provider_name.clone(),
                message: format!("{} (body: {})", e, body),
            })?;

        let result = self.from_openai_response(parsed)?;
        tracing::debug!(
            provider = %self.provider_name,
            model = %result.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion finished"
        );
        Ok(result)
    }

    async fn chat_completion_stream(
        &self,
        request: &ProviderRequest,
    ) -> ProviderResult<mpsc::Receiver<ProviderResult<StreamChunk>>> {
        let response = self.post(request, true).await?;
        let (tx, rx) = mpsc::channel(100);
        let provider = self.provider_name.clone();
        let timeout = request.timeout.unwrap_or(self.timeout);

        // Spawn task to parse SSE stream
        tokio::spawn(async move {
            tracing::debug!("[STREAM] {} streaming task started", provider);
            let mut stream = response.bytes_stream();
            let mut sse = SseBuffer::new();
            let mut finish_reason: Option<String> = None;
            let mut terminated = false;

            'outer: while let Some(chunk) = stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::error!("Stream error: {}", e);
                        let _ = tx
                            .send(Err(ProviderError::from_transport(&provider, timeout, e)))
                            .await;
                        return;
                    }
                };
                sse.push(&bytes);

                while let Some(data) = sse.next_data() {
                    if data == DONE_MARKER {
                        terminated = true;
                        break 'outer;
                    }

                    let parsed = match serde_json::from_str::<OpenAIStreamChunk>(&data) {
                        Ok(parsed) => parsed,
                        Err(e) => {
                            tracing::debug!("Skipping unparseable stream line: {}", e);
                            continue;
                        }
                    };

                    if let Some(choice) = parsed.choices.into_iter().next() {
                        if choice.finish_reason.is_some() {
                            finish_reason = choice.finish_reason;
                        }
                        if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
                            // Receiver dropped: consumer cancelled
                            if tx.send(Ok(StreamChunk::TextDelta(content))).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }

            if !terminated {
                tracing::warn!("{} stream closed without {}", provider, DONE_MARKER);
                let _ = tx.send(Err(sse::truncated(&provider))).await;
                return;
            }

            let _ = tx
                .send(Ok(StreamChunk::Done {
                    finish_reason,
                    usage: None,
                }))
                .await;
            tracing::debug!("[STREAM] {} streaming task finished", provider);
        });

        Ok(rx)
    }

    fn name(&self) -> &str {
        &self.provider_name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn models(&self) -> Vec<ModelInfo> {
        self.catalog.clone()
    }
}

// Chat-completions wire types

#[derive(Debug, Clone, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "is_false")]
    stream: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: String,
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::types::Role;

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new_openai("test-key".to_string());
        assert!(provider.is_ok());
    }

    #[test]
    fn test_empty_key_rejected() {
        let err = OpenAIProvider::new_zhipu("  ".to_string()).err().unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[test]
    fn test_provider_names_and_endpoints() {
        let openai = OpenAIProvider::new_openai("k".to_string()).unwrap();
        assert_eq!(openai.name(), "openai");
        assert_eq!(openai.endpoint(), "https://api.openai.com/v1/chat/completions");

        let zhipu = OpenAIProvider::new_zhipu("k".to_string()).unwrap();
        assert_eq!(zhipu.name(), "zhipu");
        assert_eq!(zhipu.default_model(), "glm-4");
        assert_eq!(
            zhipu.endpoint(),
            "https://open.bigmodel.cn/api/paas/v4/chat/completions"
        );
    }

    #[test]
    fn test_model_catalogue() {
        let zhipu = OpenAIProvider::new_zhipu("k".to_string()).unwrap();
        let names: Vec<String> = zhipu.models().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["glm-4", "glm-4-flash", "glm-4-air", "glm-4-long"]);
    }

    #[test]
    fn test_system_prompt_prepended() {
        let provider = OpenAIProvider::new_openai("k".to_string()).unwrap();
        let request = ProviderRequest::new(vec![
            ChatMessage::user("hi"),
            ChatMessage::new(Role::Assistant, "hello"),
        ])
        .with_system("persona");

        let wire = provider.to_openai_request(&request);
        assert_eq!(wire.model, "gpt-3.5-turbo");
        assert_eq!(wire.messages.len(), 3);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[0].content, "persona");
        assert_eq!(wire.messages[2].role, "assistant");
    }
}
