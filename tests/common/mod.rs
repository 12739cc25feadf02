// Shared fixtures for integration tests
//
// `ScriptedProvider` stands in for a vendor: replies come from a queue, a
// responder closure or a default, and calls can be made to fail or stall
// when the system prompt mentions a given character.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use rolecast::config::AppConfig;
use rolecast::error::ProviderError;
use rolecast::providers::{
    LlmProvider, ModelInfo, ProviderRequest, ProviderResponse, ProviderResult, StreamChunk,
    TokenUsage,
};
use rolecast::storage::StorageFormat;

type Responder = Box<dyn Fn(&ProviderRequest) -> String + Send + Sync>;

pub enum Scripted {
    Reply(String),
    Fail(ProviderError),
}

#[derive(Default)]
pub struct ScriptedProvider {
    queue: Mutex<VecDeque<Scripted>>,
    responder: Option<Responder>,
    default_reply: Option<String>,
    fail_for: Vec<String>,
    stall_for: Vec<(String, Duration)>,
    latency: Option<Duration>,
    cut_streams: bool,
    requests: Mutex<Vec<ProviderRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply; queued entries are used before anything else
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Reply(text.into()));
        self
    }

    pub fn fail(self, error: ProviderError) -> Self {
        self.push(Scripted::Fail(error));
        self
    }

    pub fn push(&self, entry: Scripted) {
        self.queue.lock().unwrap().push_back(entry);
    }

    pub fn default_reply(mut self, text: impl Into<String>) -> Self {
        self.default_reply = Some(text.into());
        self
    }

    pub fn responder(mut self, f: impl Fn(&ProviderRequest) -> String + Send + Sync + 'static) -> Self {
        self.responder = Some(Box::new(f));
        self
    }

    /// Fail with a network error whenever the system prompt contains `needle`
    pub fn fail_for(mut self, needle: &str) -> Self {
        self.fail_for.push(needle.to_string());
        self
    }

    /// Sleep before answering whenever the system prompt contains `needle`
    pub fn stall_for(mut self, needle: &str, delay: Duration) -> Self {
        self.stall_for.push((needle.to_string(), delay));
        self
    }

    /// Sleep before every answer
    pub fn latency(mut self, delay: Duration) -> Self {
        self.latency = Some(delay);
        self
    }

    /// Close every stream after its fragments without a `Done` chunk
    pub fn cut_streams(mut self) -> Self {
        self.cut_streams = true;
        self
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ProviderRequest {
        self.requests().pop().expect("no request was sent")
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(&self, request: &ProviderRequest) -> ProviderResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        let system = request.system.clone().unwrap_or_default();

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.latency {
            tokio::time::sleep(delay).await;
        }
        for (needle, delay) in &self.stall_for {
            if system.contains(needle.as_str()) {
                tokio::time::sleep(*delay).await;
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_for.iter().any(|n| system.contains(n.as_str())) {
            return Err(ProviderError::Network {
                provider: "scripted".into(),
                message: "connection reset".into(),
            });
        }

        let queued = self.queue.lock().unwrap().pop_front();
        match queued {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(e)) => Err(e),
            None => {
                if let Some(responder) = &self.responder {
                    Ok(responder(request))
                } else if let Some(text) = &self.default_reply {
                    Ok(text.clone())
                } else {
                    Err(ProviderError::MalformedResponse {
                        provider: "scripted".into(),
                        message: "script exhausted".into(),
                    })
                }
            }
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn chat_completion(&self, request: &ProviderRequest) -> ProviderResult<ProviderResponse> {
        let content = self.answer(request).await?;
        Ok(ProviderResponse {
            id: "scripted-1".into(),
            model: "scripted-model".into(),
            content,
            finish_reason: Some("stop".into()),
            usage: TokenUsage::new(10, 5),
            provider: "scripted".into(),
        })
    }

    async fn chat_completion_stream(
        &self,
        request: &ProviderRequest,
    ) -> ProviderResult<mpsc::Receiver<ProviderResult<StreamChunk>>> {
        let content = self.answer(request).await?;
        let cut = self.cut_streams;
        let (tx, rx) = mpsc::channel(8);
        tokio::spawn(async move {
            for word in content.split_inclusive(' ') {
                if tx.send(Ok(StreamChunk::TextDelta(word.to_string()))).await.is_err() {
                    return;
                }
            }
            if cut {
                return;
            }
            let _ = tx
                .send(Ok(StreamChunk::Done {
                    finish_reason: Some("stop".into()),
                    usage: None,
                }))
                .await;
        });
        Ok(rx)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted-model"
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo::new("scripted-model", 4096, "Test double")]
    }
}

/// Config rooted at `data_dir` with a key set and retries disabled
pub fn test_config(data_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.providers.openai.api_key = Some("sk-test".into());
    config.storage.data_dir = data_dir.to_path_buf();
    config.storage.format = StorageFormat::Json;
    config.retry.max_attempts = 1;
    config.validation.call_timeout_secs = 5;
    config
}

pub fn as_dyn(provider: &Arc<ScriptedProvider>) -> Arc<dyn LlmProvider> {
    Arc::clone(provider) as Arc<dyn LlmProvider>
}
