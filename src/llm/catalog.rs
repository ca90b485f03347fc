// Model listing with an on-disk cache

use crate::llm::provider::LLMAdapter;
use crate::settings::SettingsStorage;
use crate::types::{AppResult, ModelInfo};
use tracing::{info, warn};

/// Returns the model listing, served from the cache while it is fresh.
///
/// A failed cache write is logged and does not fail the call.
pub async fn available_models(
    adapter: &dyn LLMAdapter,
    storage: &SettingsStorage,
    force_refresh: bool,
) -> AppResult<Vec<ModelInfo>> {
    if !force_refresh {
        if let Some(models) = storage.cached_models().await {
            info!(count = models.len(), "Serving model list from cache");
            return Ok(models);
        }
    }

    let models = adapter.list_models().await?;
    info!(count = models.len(), "Fetched model list from upstream");

    if let Err(e) = storage.store_models(&models).await {
        warn!(error = %e, "Failed to cache model list");
    }
    Ok(models)
}
