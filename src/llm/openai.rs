// OpenAI-compatible adapter
// Speaks `POST {base}/chat/completions` and `GET {base}/models` over reqwest.

use crate::llm::provider::{ByteStream, LLMAdapter};
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest, LLMResponse, ModelInfo, TokenUsage};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub struct OpenAICompatAdapter {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<&'a LLMMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ModelListResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

impl OpenAICompatAdapter {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_client(Client::new(), api_base, api_key)
    }

    pub fn with_client(client: Client, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_config(config: &crate::config::LLMConfig) -> Self {
        Self::new(config.api_base.clone(), config.api_key.clone())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn post_completion(&self, request: &LLMRequest, stream: bool) -> AppResult<reqwest::Response> {
        let system = request.system_instruction.as_ref().map(LLMMessage::system);
        let messages: Vec<&LLMMessage> = system.iter().chain(request.messages.iter()).collect();

        let body = ChatCompletionRequest {
            model: &request.model,
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };

        debug!(model = %request.model, stream, message_count = body.messages.len(), "Sending chat completion");

        let response = self
            .authorize(self.client.post(self.url("chat/completions")))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("completion request failed: {}", e)))?;

        ensure_success(response).await
    }
}

#[async_trait]
impl LLMAdapter for OpenAICompatAdapter {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        let response = self.post_completion(request, false).await?;

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("failed to parse completion response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMApi("completion returned no choices".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn create_chat_completion_stream(&self, request: &LLMRequest) -> AppResult<ByteStream> {
        let response = self.post_completion(request, true).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| AppError::Stream(format!("failed to read response body: {}", e))));

        Ok(stream.boxed())
    }

    async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
        let response = self
            .authorize(self.client.get(self.url("models")))
            .send()
            .await
            .map_err(|e| AppError::LLMApi(format!("model listing failed: {}", e)))?;

        let listing: ModelListResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::LLMApi(format!("failed to parse model listing: {}", e)))?;

        Ok(listing.data)
    }
}

async fn ensure_success(response: reqwest::Response) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message_from_body(status.as_u16(), &body);
    warn!(status = status.as_u16(), error = %message, "Upstream returned an error status");

    Err(AppError::Upstream {
        status: status.as_u16(),
        message,
    })
}

/// Pulls a human readable message out of an error body.
///
/// Tries `error.message`, `error` (as a string), `message`, `detail` and `msg`
/// in that order, then the raw text, then the bare status.
pub fn error_message_from_body(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("error"),
            value.get("message"),
            value.get("detail"),
            value.get("msg"),
        ];

        if let Some(message) = candidates
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .find(|s| !s.trim().is_empty())
        {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    format!("HTTP {}", status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message_from_body(500, r#"{"error":{"message":"rate limited"}}"#),
            "rate limited"
        );
        assert_eq!(error_message_from_body(400, r#"{"error":"bad model"}"#), "bad model");
        assert_eq!(error_message_from_body(400, r#"{"message":"nope"}"#), "nope");
        assert_eq!(error_message_from_body(422, r#"{"detail":"invalid body"}"#), "invalid body");
        assert_eq!(error_message_from_body(502, "upstream exploded"), "upstream exploded");
        assert_eq!(error_message_from_body(503, "  "), "HTTP 503");
        // JSON without any known field falls back to the raw text
        assert_eq!(error_message_from_body(500, r#"{"code":7}"#), r#"{"code":7}"#);
    }

    #[tokio::test]
    async fn test_create_chat_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "model": "gpt-4o-mini",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}]}"#)
            .create_async()
            .await;

        let adapter = OpenAICompatAdapter::new(server.url(), None);
        let request = LLMRequest::new("gpt-4o-mini", vec![LLMMessage::user("hi")])
            .with_system_instruction("be brief");

        let response = adapter.create_chat_completion(&request).await.unwrap();
        assert_eq!(response.content, "hello");
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_error_status_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body(r#"{"error":{"message":"rate limited"}}"#)
            .create_async()
            .await;

        let adapter = OpenAICompatAdapter::new(server.url(), Some("sk-test".to_string()));
        let request = LLMRequest::new("gpt-4o-mini", vec![LLMMessage::user("hi")]);

        match adapter.create_chat_completion_stream(&request).await {
            Err(AppError::Upstream { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "rate limited");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn test_list_models() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"object":"list","data":[{"id":"gpt-4o-mini","object":"model","created":1,"owned_by":"openai"},{"id":"AI4Chat/default"}]}"#,
            )
            .create_async()
            .await;

        let adapter = OpenAICompatAdapter::new(format!("{}/", server.url()), None);
        let models = adapter.list_models().await.unwrap();

        assert_eq!(models.len(), 2);
        assert_eq!(models[0].owned_by.as_deref(), Some("openai"));
        assert_eq!(models[1].id, "AI4Chat/default");
        assert_eq!(models[1].object, "model");
    }
}
