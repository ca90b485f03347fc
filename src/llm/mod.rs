// LLM abstraction layer

pub mod catalog;
pub mod openai;
pub mod provider;
pub mod sse;

pub use catalog::available_models;
pub use openai::OpenAICompatAdapter;
pub use provider::*;
