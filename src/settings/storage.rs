//! Settings Storage
//!
//! File-based storage for user settings and the model listing cache.

use super::UserSettings;
use crate::types::{AppError, AppResult, ModelInfo};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const SETTINGS_FILE: &str = "settings.json";
const MODEL_CACHE_FILE: &str = "model_cache.json";

/// How long a cached model listing stays valid
pub fn model_cache_ttl() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelCache {
    cached_at: DateTime<Utc>,
    models: Vec<ModelInfo>,
}

/// Settings storage manager
pub struct SettingsStorage {
    settings_path: PathBuf,
    model_cache_path: PathBuf,
}

impl SettingsStorage {
    pub fn with_path(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref();
        Self {
            settings_path: base_dir.join(SETTINGS_FILE),
            model_cache_path: base_dir.join(MODEL_CACHE_FILE),
        }
    }

    pub fn from_config(config: &crate::config::SettingsConfig) -> Self {
        Self::with_path(&config.data_dir)
    }

    async fn ensure_dir(&self) -> AppResult<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Settings(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        Ok(())
    }

    /// Load settings from disk; a missing or unreadable file yields defaults
    pub async fn load(&self) -> UserSettings {
        let content = match fs::read_to_string(&self.settings_path).await {
            Ok(content) => content,
            Err(_) => {
                debug!("No settings file found, using defaults");
                return UserSettings::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, path = ?self.settings_path, "Settings file is corrupt, using defaults");
                UserSettings::default()
            }
        }
    }

    pub async fn save(&self, settings: &UserSettings) -> AppResult<()> {
        self.ensure_dir().await?;
        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Settings(e.to_string()))?;
        fs::write(&self.settings_path, content)
            .await
            .map_err(|e| AppError::Settings(format!("cannot write settings: {}", e)))?;

        info!("Saved settings to {:?}", self.settings_path);
        Ok(())
    }

    pub async fn system_prompt(&self) -> Option<String> {
        self.load().await.system_prompt
    }

    pub async fn set_system_prompt(&self, prompt: &str) -> AppResult<()> {
        let mut settings = self.load().await;
        settings.system_prompt = Some(prompt.to_string());
        self.save(&settings).await
    }

    pub async fn clear_system_prompt(&self) -> AppResult<()> {
        let mut settings = self.load().await;
        settings.system_prompt = None;
        self.save(&settings).await
    }

    /// Cached model listing, `None` when missing, corrupt or older than the TTL
    pub async fn cached_models(&self) -> Option<Vec<ModelInfo>> {
        self.cached_models_at(Utc::now()).await
    }

    async fn cached_models_at(&self, now: DateTime<Utc>) -> Option<Vec<ModelInfo>> {
        let content = fs::read_to_string(&self.model_cache_path).await.ok()?;
        let cache: ModelCache = match serde_json::from_str(&content) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Model cache is corrupt, ignoring it");
                return None;
            }
        };

        if now - cache.cached_at >= model_cache_ttl() {
            debug!(cached_at = %cache.cached_at, "Model cache expired");
            return None;
        }
        Some(cache.models)
    }

    pub async fn store_models(&self, models: &[ModelInfo]) -> AppResult<()> {
        self.store_models_at(models, Utc::now()).await
    }

    async fn store_models_at(&self, models: &[ModelInfo], now: DateTime<Utc>) -> AppResult<()> {
        self.ensure_dir().await?;
        let cache = ModelCache {
            cached_at: now,
            models: models.to_vec(),
        };
        let content = serde_json::to_string(&cache).map_err(|e| AppError::Settings(e.to_string()))?;
        fs::write(&self.model_cache_path, content)
            .await
            .map_err(|e| AppError::Settings(format!("cannot write model cache: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn model(id: &str) -> ModelInfo {
        ModelInfo {
            id: id.to_string(),
            object: "model".to_string(),
            created: None,
            owned_by: None,
        }
    }

    #[tokio::test]
    async fn test_system_prompt_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path().join("nested"));

        assert_eq!(storage.system_prompt().await, None);

        storage.set_system_prompt("Answer in French").await.unwrap();
        assert_eq!(storage.system_prompt().await.as_deref(), Some("Answer in French"));

        storage.clear_system_prompt().await.unwrap();
        assert_eq!(storage.system_prompt().await, None);
    }

    #[tokio::test]
    async fn test_corrupt_settings_fall_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(SETTINGS_FILE), "{ nope").unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path());

        assert_eq!(storage.load().await, UserSettings::default());
    }

    #[tokio::test]
    async fn test_model_cache_expires_after_an_hour() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path());
        let stored_at = Utc::now();

        assert!(storage.cached_models().await.is_none());

        storage
            .store_models_at(&[model("gpt-4o-mini"), model("AI4Chat/default")], stored_at)
            .await
            .unwrap();

        let fresh = storage
            .cached_models_at(stored_at + Duration::minutes(59))
            .await
            .unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].id, "gpt-4o-mini");

        assert!(storage
            .cached_models_at(stored_at + Duration::minutes(60))
            .await
            .is_none());
    }
}
