use crate::agents::{AIQueryPlanner, PromptAugmenter, ResearchAggregator};
use super::clamp_max_queries;
use crate::models::{AppState, ResearchRequest, ResearchResponse};
use crate::types::{AppError, AppResult};
use axum::{extract::State, routing::post, Json, Router};
use tracing::info;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/research", post(run_research))
        .with_state(state)
}

/// Run the research pipeline alone and return the result with its prompt block
async fn run_research(
    State(state): State<AppState>,
    Json(request): Json<ResearchRequest>,
) -> AppResult<Json<ResearchResponse>> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(AppError::InvalidRequest("topic must not be empty".to_string()));
    }

    let model = request
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.config.llm.default_model.clone());
    let max_queries = clamp_max_queries(request.max_queries.unwrap_or(state.config.research.max_queries));

    info!(topic = %topic, model = %model, max_queries, "Received research request");

    let research = ResearchAggregator::new(AIQueryPlanner::new(state.llm.clone()), state.search.clone())
        .with_options(state.config.search.options())
        .with_concurrency(state.config.research.concurrency)
        .comprehensive_search(topic, max_queries, &model)
        .await;

    let context = PromptAugmenter::format(&research, topic);
    Ok(Json(ResearchResponse { research, context }))
}
