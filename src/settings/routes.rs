//! Settings API Routes
//!
//! - GET /api/settings/system-prompt - Current prompt and whether it is custom
//! - PUT /api/settings/system-prompt - Store a custom prompt
//! - DELETE /api/settings/system-prompt - Revert to the default prompt

use super::{UserSettings, DEFAULT_SYSTEM_PROMPT};
use crate::models::AppState;
use crate::types::{AppError, AppResult};
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemPromptResponse {
    pub system_prompt: String,
    pub is_custom: bool,
    pub default_prompt: String,
}

impl From<&UserSettings> for SystemPromptResponse {
    fn from(settings: &UserSettings) -> Self {
        Self {
            system_prompt: settings.effective_system_prompt().to_string(),
            is_custom: settings.system_prompt.is_some(),
            default_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSystemPromptRequest {
    pub system_prompt: String,
}

/// Create the settings router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/settings/system-prompt",
            get(get_system_prompt)
                .put(update_system_prompt)
                .delete(reset_system_prompt),
        )
        .with_state(state)
}

async fn get_system_prompt(State(state): State<AppState>) -> Json<SystemPromptResponse> {
    let settings = state.settings.load().await;
    Json(SystemPromptResponse::from(&settings))
}

async fn update_system_prompt(
    State(state): State<AppState>,
    Json(request): Json<UpdateSystemPromptRequest>,
) -> AppResult<Json<SystemPromptResponse>> {
    let prompt = request.system_prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::InvalidRequest(
            "systemPrompt must not be empty; use DELETE to restore the default".to_string(),
        ));
    }

    state.settings.set_system_prompt(prompt).await?;
    info!(prompt_len = prompt.len(), "Custom system prompt updated");

    let settings = state.settings.load().await;
    Ok(Json(SystemPromptResponse::from(&settings)))
}

async fn reset_system_prompt(State(state): State<AppState>) -> AppResult<Json<SystemPromptResponse>> {
    state.settings.clear_system_prompt().await?;
    info!("System prompt reset to default");
    Ok(Json(SystemPromptResponse::from(&UserSettings::default())))
}
