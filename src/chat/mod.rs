//! Chat
//!
//! Conversation state, the streaming completion consumer, and the session
//! that runs a full turn (research, augmentation, streaming).

pub mod conversation;
pub mod session;
pub mod streaming;

pub use conversation::{Conversation, ConversationMessage, SharedConversation};
pub use session::{ChatOptions, ChatSession};
pub use streaming::{apology, ChatEvent, ChatOutcome, ChatState, StreamingChatClient};
