// Conversation state shared between a chat session and its stream consumer

use crate::types::{LLMMessage, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Ordered message list; messages are only added, edited by id, or cleared together
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ConversationMessage>,
}

pub type SharedConversation = Arc<RwLock<Conversation>>;

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from prior turns, e.g. history sent by a browser
    pub fn from_history(history: impl IntoIterator<Item = LLMMessage>) -> Self {
        Self {
            messages: history
                .into_iter()
                .map(|m| ConversationMessage::new(m.role, m.content))
                .collect(),
        }
    }

    pub fn shared(self) -> SharedConversation {
        Arc::new(RwLock::new(self))
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> Uuid {
        self.push(ConversationMessage::new(Role::User, content))
    }

    /// Empty assistant message that a stream will fill in
    pub fn push_assistant_placeholder(&mut self) -> Uuid {
        self.push(ConversationMessage::new(Role::Assistant, ""))
    }

    fn push(&mut self, message: ConversationMessage) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    /// Replace the content of message `id`. Returns false when it no longer exists.
    pub fn set_content(&mut self, id: Uuid, content: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content = content.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&ConversationMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn reset(&mut self) {
        self.messages.clear();
    }

    /// Messages as completion input, stopping before `until` (exclusive)
    pub fn history(&self, until: Option<Uuid>) -> Vec<LLMMessage> {
        self.messages
            .iter()
            .take_while(|m| Some(m.id) != until)
            .filter(|m| m.role != Role::System)
            .map(|m| LLMMessage::new(m.role, m.content.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_content_by_id() {
        let mut conversation = Conversation::new();
        let user = conversation.push_user("hi");
        let assistant = conversation.push_assistant_placeholder();

        assert!(conversation.set_content(assistant, "hello"));
        assert_eq!(conversation.get(assistant).unwrap().content, "hello");
        assert_eq!(conversation.get(user).unwrap().content, "hi");
        assert_eq!(conversation.messages().len(), 2);

        conversation.reset();
        assert!(!conversation.set_content(assistant, "late"));
        assert!(conversation.messages().is_empty());
    }

    #[test]
    fn test_history_stops_before_placeholder() {
        let mut conversation = Conversation::from_history(vec![
            LLMMessage::user("earlier"),
            LLMMessage::assistant("reply"),
        ]);
        conversation.push_user("now");
        let assistant = conversation.push_assistant_placeholder();

        let history = conversation.history(Some(assistant));
        assert_eq!(
            history,
            vec![
                LLMMessage::user("earlier"),
                LLMMessage::assistant("reply"),
                LLMMessage::user("now"),
            ]
        );
        assert_eq!(conversation.history(None).len(), 4);
    }
}
