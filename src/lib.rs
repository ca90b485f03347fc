// ChatSearch - streaming chat with web search augmentation

pub mod agents;
pub mod chat;
pub mod config;
pub mod llm;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod search;
pub mod settings;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
