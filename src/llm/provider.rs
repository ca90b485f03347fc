use crate::types::{AppResult, LLMRequest, LLMResponse, ModelInfo};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Raw body of a streaming completion, yielded chunk by chunk as it arrives
pub type ByteStream = BoxStream<'static, AppResult<Bytes>>;

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    /// Single non-streaming completion
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;

    /// Starts a streaming completion. Resolves once the upstream answered with a
    /// success status; non-success statuses are returned as `AppError::Upstream`.
    async fn create_chat_completion_stream(&self, request: &LLMRequest) -> AppResult<ByteStream>;

    async fn list_models(&self) -> AppResult<Vec<ModelInfo>>;
}

pub type SharedLLM = Arc<dyn LLMAdapter>;
