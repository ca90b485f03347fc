//! Chat Session
//!
//! One conversation plus the services a turn needs. A turn appends the user
//! message and an empty assistant message, optionally researches the question
//! on the web, splices the research into the outgoing prompt and streams the
//! answer into the assistant message.

use super::conversation::{Conversation, SharedConversation};
use super::streaming::{ChatEvent, ChatOutcome, ChatState, StreamingChatClient};
use crate::agents::{AIQueryPlanner, PromptAugmenter, ResearchAggregator, ResearchResult, DEFAULT_MAX_QUERIES};
use crate::config::Config;
use crate::llm::SharedLLM;
use crate::search::{SearchOptions, SharedSearch};
use crate::settings::DEFAULT_SYSTEM_PROMPT;
use crate::types::LLMRequest;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub system_prompt: String,
    pub web_search: bool,
    pub max_queries: usize,
    pub search_options: SearchOptions,
    pub concurrency: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: crate::config::DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            web_search: true,
            max_queries: DEFAULT_MAX_QUERIES,
            search_options: SearchOptions::default(),
            concurrency: 1,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl ChatOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.llm.default_model.clone(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            web_search: config.research.enabled,
            max_queries: config.research.max_queries,
            search_options: config.search.options(),
            concurrency: config.research.concurrency,
            temperature: Some(config.llm.temperature),
            max_tokens: Some(config.llm.max_tokens),
        }
    }
}

pub struct ChatSession {
    conversation: SharedConversation,
    llm: SharedLLM,
    search: SharedSearch,
    client: StreamingChatClient,
    options: ChatOptions,
}

impl ChatSession {
    pub fn new(llm: SharedLLM, search: SharedSearch, options: ChatOptions) -> Self {
        Self::with_conversation(Conversation::new(), llm, search, options)
    }

    pub fn with_conversation(
        conversation: Conversation,
        llm: SharedLLM,
        search: SharedSearch,
        options: ChatOptions,
    ) -> Self {
        Self {
            conversation: conversation.shared(),
            client: StreamingChatClient::new(llm.clone()),
            llm,
            search,
            options,
        }
    }

    pub fn conversation(&self) -> &SharedConversation {
        &self.conversation
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    pub async fn reset(&self) {
        self.conversation.write().await.reset();
    }

    /// Run the research pipeline for `topic` with this session's model and limits
    pub async fn research(&self, topic: &str) -> ResearchResult {
        ResearchAggregator::new(AIQueryPlanner::new(self.llm.clone()), self.search.clone())
            .with_options(self.options.search_options.clone())
            .with_concurrency(self.options.concurrency)
            .comprehensive_search(topic, self.options.max_queries, &self.options.model)
            .await
    }

    pub async fn send_user_message<F>(&self, text: &str, cancel: &CancellationToken, mut on_event: F) -> ChatOutcome
    where
        F: FnMut(ChatEvent) + Send,
    {
        let (assistant_id, mut messages) = {
            let mut conversation = self.conversation.write().await;
            conversation.push_user(text);
            let id = conversation.push_assistant_placeholder();
            (id, conversation.history(Some(id)))
        };

        if self.options.web_search {
            let research = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    on_event(ChatEvent::State { state: ChatState::Cancelled });
                    return ChatOutcome { state: ChatState::Cancelled, content: String::new() };
                }
                research = self.research(text) => research,
            };

            if let Some(reason) = research.fallback_reason() {
                on_event(ChatEvent::Notice {
                    message: format!("Web search used keyword-based queries because AI planning was unavailable: {reason}"),
                });
            }
            on_event(ChatEvent::Research {
                queries: research.query_plan.queries.iter().map(|q| q.query.clone()).collect(),
                summary: research.summary.clone(),
            });

            let block = PromptAugmenter::format(&research, text);
            messages = PromptAugmenter::augment_messages(messages, block);
        }

        info!(
            model = %self.options.model,
            message_count = messages.len(),
            web_search = self.options.web_search,
            "Sending chat turn"
        );

        let mut request = LLMRequest::new(self.options.model.clone(), messages)
            .with_system_instruction(self.options.system_prompt.clone());
        request.temperature = self.options.temperature;
        request.max_tokens = self.options.max_tokens;

        self.client
            .send(&request, &self.conversation, assistant_id, cancel, on_event)
            .await
    }
}
