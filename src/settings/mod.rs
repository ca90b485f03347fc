//! Settings Module
//!
//! Local preferences that survive restarts: the user's custom system prompt
//! and a cached copy of the model listing. Both live as JSON files in the
//! configured data directory.

pub mod routes;
pub mod storage;

pub use routes::router;
pub use storage::*;

use serde::{Deserialize, Serialize};

/// System prompt used when the user has not set one
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful, knowledgeable assistant. \
Answer clearly and concisely. When web search context is provided, ground your answer in it \
and cite the sources you rely on.";

/// User settings structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    /// Custom system prompt, `None` means the default prompt is used
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl UserSettings {
    /// The prompt that should actually be sent
    pub fn effective_system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }
}
