use crate::agents::ResearchResult;
use crate::config::Config;
use crate::llm::{OpenAICompatAdapter, SharedLLM};
use crate::search::{SearchClient, SharedSearch};
use crate::settings::SettingsStorage;
use crate::types::LLMMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub llm: SharedLLM,
    pub search: SharedSearch,
    pub settings: Arc<SettingsStorage>,
}

impl AppState {
    pub fn new(config: Config, llm: SharedLLM, search: SharedSearch, settings: SettingsStorage) -> Self {
        Self {
            config,
            llm,
            search,
            settings: Arc::new(settings),
        }
    }

    /// State wired to the real completion and search APIs
    pub fn from_config(config: Config) -> Self {
        let llm = Arc::new(OpenAICompatAdapter::from_config(&config.llm));
        let search = Arc::new(SearchClient::from_config(&config.search));
        let settings = SettingsStorage::from_config(&config.settings);
        Self::new(config, llm, search, settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// Prior turns, oldest first
    #[serde(default)]
    pub history: Vec<LLMMessage>,
    pub model: Option<String>,
    pub web_search: Option<bool>,
    pub max_queries: Option<usize>,
    /// Overrides the stored system prompt for this request only
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub topic: String,
    pub model: Option<String>,
    pub max_queries: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResearchResponse {
    pub research: ResearchResult,
    /// The prompt block this research would produce
    pub context: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelsQuery {
    #[serde(default)]
    pub refresh: bool,
}
