use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

/// Completion API used when `LLM_API_BASE` is not set
pub const DEFAULT_LLM_API_BASE: &str = "https://api.openai.com/v1";
/// Search API used when `SEARCH_API_BASE` is not set
pub const DEFAULT_SEARCH_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
    pub settings: SettingsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub api_base: String,
    pub engine: String,
    pub max_results: u32,
    pub region: String,
    pub safesearch: String,
    pub search_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    pub enabled: bool,
    pub max_queries: usize,
    /// 1 keeps queries strictly sequential
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                api_base: env::var("LLM_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_LLM_API_BASE.to_string()),
                api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
                default_model: env::var("DEFAULT_MODEL")
                    .unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
                temperature: env::var("LLM_TEMPERATURE")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()?,
                max_tokens: env::var("LLM_MAX_TOKENS")
                    .unwrap_or_else(|_| "2048".to_string())
                    .parse()?,
            },
            search: SearchConfig {
                api_base: env::var("SEARCH_API_BASE")
                    .unwrap_or_else(|_| DEFAULT_SEARCH_API_BASE.to_string()),
                engine: env::var("SEARCH_ENGINE").unwrap_or_else(|_| "google".to_string()),
                max_results: env::var("SEARCH_MAX_RESULTS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                region: env::var("SEARCH_REGION").unwrap_or_else(|_| "all".to_string()),
                safesearch: env::var("SEARCH_SAFESEARCH")
                    .unwrap_or_else(|_| "moderate".to_string()),
                search_type: env::var("SEARCH_TYPE").unwrap_or_else(|_| "text".to_string()),
            },
            research: ResearchConfig {
                enabled: env::var("WEB_SEARCH_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
                max_queries: env::var("RESEARCH_MAX_QUERIES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                concurrency: env::var("RESEARCH_CONCURRENCY")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()?,
            },
            settings: SettingsConfig {
                data_dir: env::var("SETTINGS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_data_dir()),
            },
            logging: LoggingConfig {
                log_dir: env::var("LOG_DIR").ok().map(PathBuf::from),
            },
        })
    }
}

impl SearchConfig {
    /// Per-request search options derived from the configured defaults
    pub fn options(&self) -> crate::search::SearchOptions {
        crate::search::SearchOptions {
            engine: self.engine.clone(),
            max_results: self.max_results,
            region: self.region.clone(),
            safesearch: self.safesearch.clone(),
            search_type: self.search_type.clone(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chatsearch")
}
