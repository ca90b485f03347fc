//! API Routes
//!
//! - `/api/health` - Health check
//! - `/api/chat` - Chat turn streamed as server-sent events
//! - `/api/research` - Research pipeline on its own
//! - `/api/models` - Model listing (cached)
//! - `/api/settings/system-prompt` - Custom system prompt

pub mod chat;
pub mod health;
pub mod models;
pub mod research;

use crate::middleware::cors_layer;
use crate::models::AppState;
use crate::settings;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let cors = cors_layer(&state.config.server.cors_allowed_origins);

    Router::new()
        .merge(chat::router(state.clone()))
        .merge(research::router(state.clone()))
        .merge(models::router(state.clone()))
        .merge(settings::router(state))
        .merge(health::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Upper bound on `maxQueries` accepted from clients
pub(crate) const MAX_QUERIES_LIMIT: usize = 8;

/// Keeps a client-supplied query count within `1..=MAX_QUERIES_LIMIT`
pub(crate) fn clamp_max_queries(requested: usize) -> usize {
    requested.clamp(1, MAX_QUERIES_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        Config, LLMConfig, LoggingConfig, ResearchConfig, SearchConfig, ServerConfig, SettingsConfig,
    };
    use crate::llm::{ByteStream, LLMAdapter};
    use crate::search::{SearchError, SearchOptions, SearchResponse, WebSearch};
    use crate::settings::{SettingsStorage, DEFAULT_SYSTEM_PROMPT};
    use crate::types::{AppError, AppResult, LLMRequest, LLMResponse, ModelInfo};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use futures::{stream, StreamExt};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct EchoLLM;

    #[async_trait]
    impl LLMAdapter for EchoLLM {
        async fn create_chat_completion(&self, _request: &LLMRequest) -> AppResult<LLMResponse> {
            Err(AppError::LLMApi("planning disabled".to_string()))
        }

        async fn create_chat_completion_stream(&self, _request: &LLMRequest) -> AppResult<ByteStream> {
            let chunks = vec![
                Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n")),
                Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n")),
                Ok(Bytes::from_static(b"data: [DONE]\n\n")),
            ];
            Ok(stream::iter(chunks).boxed())
        }

        async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
            Ok(vec![ModelInfo {
                id: "gpt-4o-mini".to_string(),
                object: "model".to_string(),
                created: Some(1_700_000_000),
                owned_by: Some("openai".to_string()),
            }])
        }
    }

    /// Plans more queries than any client may ask for and keeps the instruction it saw
    #[derive(Default)]
    struct WidePlanLLM {
        instruction: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LLMAdapter for WidePlanLLM {
        async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
            *self.instruction.lock().unwrap() = request.system_instruction.clone();
            let queries: Vec<serde_json::Value> = (1..=10)
                .map(|i| serde_json::json!({"query": format!("query {i}"), "rationale": "wide"}))
                .collect();
            Ok(LLMResponse {
                content: serde_json::json!({"rationale": "wide", "queries": queries}).to_string(),
                finish_reason: None,
                usage: None,
            })
        }

        async fn create_chat_completion_stream(&self, _request: &LLMRequest) -> AppResult<ByteStream> {
            Err(AppError::Internal("not used".to_string()))
        }

        async fn list_models(&self) -> AppResult<Vec<ModelInfo>> {
            Ok(Vec::new())
        }
    }

    struct DownSearch;

    #[async_trait]
    impl WebSearch for DownSearch {
        async fn search(&self, _query: &str, _options: &SearchOptions) -> Result<SearchResponse, SearchError> {
            Err(SearchError::Request("connection refused".to_string()))
        }
    }

    fn test_config(data_dir: &std::path::Path) -> Config {
        Config {
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                cors_allowed_origins: vec!["http://localhost:5173".to_string()],
            },
            llm: LLMConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                api_key: None,
                default_model: "gpt-4o-mini".to_string(),
                temperature: 0.7,
                max_tokens: 256,
            },
            search: SearchConfig {
                api_base: "http://127.0.0.1:9".to_string(),
                engine: "google".to_string(),
                max_results: 10,
                region: "all".to_string(),
                safesearch: "moderate".to_string(),
                search_type: "text".to_string(),
            },
            research: ResearchConfig {
                enabled: true,
                max_queries: 2,
                concurrency: 1,
            },
            settings: SettingsConfig {
                data_dir: data_dir.to_path_buf(),
            },
            logging: LoggingConfig { log_dir: None },
        }
    }

    fn app(temp_dir: &TempDir) -> Router {
        app_with(temp_dir, Arc::new(EchoLLM))
    }

    fn app_with(temp_dir: &TempDir, llm: Arc<dyn LLMAdapter>) -> Router {
        let config = test_config(temp_dir.path());
        let settings = SettingsStorage::from_config(&config.settings);
        create_router(AppState::new(config, llm, Arc::new(DownSearch), settings))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let temp_dir = TempDir::new().unwrap();
        let response = app(&temp_dir)
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_streams_events() {
        let temp_dir = TempDir::new().unwrap();
        let response = app(&temp_dir)
            .oneshot(json_request(
                "POST",
                "/api/chat",
                serde_json::json!({"message": "say hello", "history": [{"role": "user", "content": "hi"}]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_text(response).await;
        let events: Vec<&str> = body
            .lines()
            .filter_map(|line| line.strip_prefix("event:"))
            .map(str::trim)
            .collect();
        for name in ["notice", "research", "state", "delta", "done"] {
            assert!(events.contains(&name), "missing {name} event in {body}");
        }
        assert_eq!(events.last(), Some(&"done"));
        assert!(body.contains(r#""content":"Hello""#));
        assert!(body.contains(r#""status":"completed""#));
    }

    #[tokio::test]
    async fn test_chat_rejects_empty_message() {
        let temp_dir = TempDir::new().unwrap();
        let response = app(&temp_dir)
            .oneshot(json_request("POST", "/api/chat", serde_json::json!({"message": "  "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_research_survives_failures() {
        let temp_dir = TempDir::new().unwrap();
        let response = app(&temp_dir)
            .oneshot(json_request("POST", "/api/research", serde_json::json!({"topic": "rust"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["research"]["summary"]["totalResults"], 0);
        assert_eq!(body["research"]["searchResults"].as_array().unwrap().len(), 2);
        assert_eq!(body["research"]["planSource"]["kind"], "heuristic");
        assert!(body["context"].as_str().unwrap().contains("No web results"));
    }

    #[tokio::test]
    async fn test_research_caps_requested_queries() {
        let temp_dir = TempDir::new().unwrap();
        let llm = Arc::new(WidePlanLLM::default());
        let response = app_with(&temp_dir, llm.clone())
            .oneshot(json_request(
                "POST",
                "/api/research",
                serde_json::json!({"topic": "rust", "maxQueries": 1_000_000}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["research"]["planSource"]["kind"], "ai");
        assert_eq!(
            body["research"]["searchResults"].as_array().unwrap().len(),
            MAX_QUERIES_LIMIT
        );

        let instruction = llm.instruction.lock().unwrap().clone().unwrap();
        assert!(instruction.contains(&format!("at most {MAX_QUERIES_LIMIT}")));
    }

    #[test]
    fn test_clamp_max_queries() {
        assert_eq!(clamp_max_queries(0), 1);
        assert_eq!(clamp_max_queries(3), 3);
        assert_eq!(clamp_max_queries(usize::MAX), MAX_QUERIES_LIMIT);
    }

    #[tokio::test]
    async fn test_models_listing() {
        let temp_dir = TempDir::new().unwrap();
        let response = app(&temp_dir)
            .oneshot(Request::builder().uri("/api/models?refresh=true").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["object"], "list");
        assert_eq!(body["data"][0]["id"], "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_system_prompt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let app = app(&temp_dir);

        let response = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/settings/system-prompt",
                serde_json::json!({"systemPrompt": "Answer like a pirate."}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/api/settings/system-prompt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["systemPrompt"], "Answer like a pirate.");
        assert_eq!(body["isCustom"], true);

        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/settings/system-prompt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["systemPrompt"], DEFAULT_SYSTEM_PROMPT);
        assert_eq!(body["isCustom"], false);
    }
}
