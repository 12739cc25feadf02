// Wire-level tests for the vendor adapters against a mock HTTP server

use anyhow::Result;
use mockito::Matcher;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use rolecast::error::ProviderError;
use rolecast::providers::{
    ChatMessage, ClaudeProvider, LlmProvider, OpenAIProvider, ProviderRequest, RetryPolicy,
    RetryingProvider, StreamChunk,
};

fn request() -> ProviderRequest {
    ProviderRequest::new(vec![ChatMessage::user("Would you use this?")])
        .with_system("You are Dr. Lin, data scientist.")
        .with_max_tokens(200)
}

async fn collect_stream(provider: &dyn LlmProvider) -> Result<(String, Option<String>)> {
    let mut rx = provider.chat_completion_stream(&request().with_stream(true)).await?;
    let mut text = String::new();
    let mut finish = None;
    while let Some(chunk) = rx.recv().await {
        match chunk? {
            StreamChunk::TextDelta(delta) => text.push_str(&delta),
            StreamChunk::Done { finish_reason, .. } => {
                finish = finish_reason;
                break;
            }
        }
    }
    Ok((text, finish))
}

#[tokio::test]
async fn test_openai_completion() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4",
            "messages": [
                { "role": "system", "content": "You are Dr. Lin, data scientist." },
                { "role": "user", "content": "Would you use this?" }
            ],
            "max_tokens": 200
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "id": "chatcmpl-1",
                "model": "gpt-4",
                "choices": [{
                    "message": { "role": "assistant", "content": "Only with clean data." },
                    "finish_reason": "stop"
                }],
                "usage": { "prompt_tokens": 31, "completion_tokens": 6 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = OpenAIProvider::new_openai("sk-test".into())?
        .with_model("gpt-4")
        .with_base_url(server.url());
    let response = provider.chat_completion(&request()).await?;

    assert_eq!(response.content, "Only with clean data.");
    assert_eq!(response.provider, "openai");
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.usage.prompt_tokens, 31);
    assert_eq!(response.usage.completion_tokens, 6);
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_zhipu_uses_its_own_path() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/paas/v4/chat/completions")
        .with_status(200)
        .with_body(
            json!({
                "model": "glm-4",
                "choices": [{ "message": { "content": "可以试试。" }, "finish_reason": "stop" }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = OpenAIProvider::new_zhipu("zk-test".into())?.with_base_url(server.url());
    let response = provider.chat_completion(&request()).await?;

    assert_eq!(response.content, "可以试试。");
    assert_eq!(response.provider, "zhipu");
    assert_eq!(response.usage.total_tokens, 0);
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_claude_completion() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "sk-ant-test")
        .match_header("anthropic-version", Matcher::Any)
        .match_body(Matcher::PartialJson(json!({
            "system": "You are Dr. Lin, data scientist.",
            "messages": [{ "role": "user", "content": "Would you use this?" }]
        })))
        .with_status(200)
        .with_body(
            json!({
                "id": "msg_1",
                "model": "claude-3-sonnet-20240229",
                "content": [{ "type": "text", "text": "It depends on the data." }],
                "stop_reason": "end_turn",
                "usage": { "input_tokens": 20, "output_tokens": 7 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let provider = ClaudeProvider::new("sk-ant-test".into())?.with_base_url(server.url());
    let response = provider.chat_completion(&request()).await?;

    assert_eq!(response.content, "It depends on the data.");
    assert_eq!(response.finish_reason.as_deref(), Some("end_turn"));
    assert_eq!(response.usage.completion_tokens, 7);
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_status_codes_map_to_error_kinds() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let provider = OpenAIProvider::new_openai("sk-test".into())?.with_base_url(server.url());

    for (status, kind) in [(401, "auth"), (429, "quota"), (500, "api")] {
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(status)
            .with_body(r#"{"error":{"message":"nope"}}"#)
            .create_async()
            .await;

        let err = provider.chat_completion(&request()).await.unwrap_err();
        assert_eq!(err.kind(), kind, "status {}", status);
        mock.remove_async().await;
    }

    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_reported() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body("<html>gateway error</html>")
        .create_async()
        .await;

    let provider = ClaudeProvider::new("sk-ant-test".into())?.with_base_url(server.url());
    let err = provider.chat_completion(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse { .. }));

    Ok(())
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body("invalid key")
        .expect(1)
        .create_async()
        .await;

    let inner = OpenAIProvider::new_openai("sk-test".into())?.with_base_url(server.url());
    let provider = RetryingProvider::new(Arc::new(inner), RetryPolicy::new(3, Duration::from_millis(1)));

    let err = provider.chat_completion(&request()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Auth { .. }));
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_openai_stream() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let body = [
        r#"data: {"choices":[{"delta":{"role":"assistant"},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"delta":{"content":"Only "},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"delta":{"content":"with clean data."},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        "data: [DONE]",
        "",
    ]
    .join("\n\n");
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJson(json!({ "stream": true })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let provider = OpenAIProvider::new_openai("sk-test".into())?.with_base_url(server.url());
    let (text, finish) = collect_stream(&provider).await?;

    assert_eq!(text, "Only with clean data.");
    assert_eq!(finish.as_deref(), Some("stop"));
    mock.assert_async().await;

    Ok(())
}

#[tokio::test]
async fn test_claude_stream() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let body = [
        "event: message_start",
        r#"data: {"type":"message_start","message":{"id":"msg_1","usage":{"input_tokens":12,"output_tokens":1}}}"#,
        "",
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"It "}}"#,
        "",
        "event: ping",
        r#"data: {"type":"ping"}"#,
        "",
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"depends."}}"#,
        "",
        "event: message_delta",
        r#"data: {"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#,
        "",
        "event: message_stop",
        r#"data: {"type":"message_stop"}"#,
        "",
    ]
    .join("\n");
    let _mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let provider = ClaudeProvider::new("sk-ant-test".into())?.with_base_url(server.url());
    let (text, finish) = collect_stream(&provider).await?;

    assert_eq!(text, "It depends.");
    assert_eq!(finish.as_deref(), Some("end_turn"));

    Ok(())
}

#[tokio::test]
async fn test_stream_without_terminator_is_an_error() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let openai_body = [
        r#"data: {"choices":[{"delta":{"content":"Only "},"finish_reason":null}]}"#,
        r#"data: {"choices":[{"delta":{"content":"with"},"finish_reason":null}]}"#,
        "",
    ]
    .join("\n\n");
    let claude_body = [
        "event: content_block_delta",
        r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"It "}}"#,
        "",
    ]
    .join("\n");
    let _openai = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(openai_body)
        .create_async()
        .await;
    let _claude = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(claude_body)
        .create_async()
        .await;

    let openai = OpenAIProvider::new_openai("sk-test".into())?.with_base_url(server.url());
    let claude = ClaudeProvider::new("sk-ant-test".into())?.with_base_url(server.url());
    let providers: [&dyn LlmProvider; 2] = [&openai, &claude];

    for provider in providers {
        let mut rx = provider.chat_completion_stream(&request().with_stream(true)).await?;
        let mut text = String::new();
        let mut outcome = None;
        while let Some(chunk) = rx.recv().await {
            match chunk {
                Ok(StreamChunk::TextDelta(delta)) => text.push_str(&delta),
                Ok(StreamChunk::Done { .. }) => panic!("{} reported a cut-off stream as done", provider.name()),
                Err(e) => {
                    outcome = Some(e);
                    break;
                }
            }
        }
        assert!(!text.is_empty());
        let err = outcome.expect("stream error");
        assert_eq!(err.kind(), "network", "{}", provider.name());
    }

    Ok(())
}

#[test]
fn test_empty_key_is_a_config_error() {
    assert!(matches!(
        OpenAIProvider::new_openai("  ".into()),
        Err(ProviderError::Config(_))
    ));
}
