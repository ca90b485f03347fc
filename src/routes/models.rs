use crate::llm::available_models;
use crate::models::{AppState, ModelsQuery};
use crate::types::{AppResult, ModelList};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/models", get(list_models))
        .with_state(state)
}

async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> AppResult<Json<ModelList>> {
    let models = available_models(state.llm.as_ref(), &state.settings, query.refresh).await?;
    Ok(Json(ModelList::new(models)))
}
