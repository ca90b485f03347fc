//! Streaming Chat Client
//!
//! Drives one streaming completion and mirrors it into the conversation.
//!
//! ```text
//! Idle → Sending → Streaming → Completed
//!           │          │    ↘  Failed
//!           └──────────┴───→  Cancelled
//! ```
//!
//! Every delta rewrites the assistant message (looked up by id) with the full
//! accumulated text. Once the cancellation token fires the conversation is
//! left exactly as it was.

use super::conversation::SharedConversation;
use crate::agents::ResearchSummary;
use crate::llm::sse::{SseDecoder, StreamRecord};
use crate::llm::SharedLLM;
use crate::types::{AppError, LLMRequest};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ChatState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Failed { error: String },
    Cancelled,
}

/// Progress reported to whoever is rendering the turn
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    /// Informational message, e.g. research fell back to the heuristic planner
    Notice { message: String },
    Research {
        queries: Vec<String>,
        summary: ResearchSummary,
    },
    State { state: ChatState },
    /// Newly received text; `content` is the whole message so far
    Delta { delta: String, content: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOutcome {
    pub state: ChatState,
    /// Final text of the assistant message
    pub content: String,
}

pub fn apology(detail: &str) -> String {
    format!("Sorry, I couldn't complete that request: {detail}")
}

enum Flow {
    Continue,
    Finished,
}

pub struct StreamingChatClient {
    llm: SharedLLM,
}

impl StreamingChatClient {
    pub fn new(llm: SharedLLM) -> Self {
        Self { llm }
    }

    pub async fn send<F>(
        &self,
        request: &LLMRequest,
        conversation: &SharedConversation,
        assistant_id: Uuid,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> ChatOutcome
    where
        F: FnMut(ChatEvent) + Send,
    {
        let mut content = String::new();
        on_event(ChatEvent::State {
            state: ChatState::Sending,
        });

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.llm.create_chat_completion_stream(request) => Some(result),
        };

        let mut stream = match opened {
            None => return cancelled(content, &mut on_event),
            Some(Err(e)) => return fail(e, conversation, assistant_id, cancel, &mut on_event).await,
            Some(Ok(stream)) => stream,
        };

        info!(model = %request.model, %assistant_id, "Completion stream opened");
        on_event(ChatEvent::State {
            state: ChatState::Streaming,
        });

        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return cancelled(content, &mut on_event),
                next = stream.next() => next,
            };

            let (records, exhausted) = match next {
                Some(Ok(bytes)) => (decoder.push(&bytes), false),
                Some(Err(e)) => return fail(e, conversation, assistant_id, cancel, &mut on_event).await,
                None => (decoder.finish().into_iter().collect(), true),
            };

            let flow = self
                .apply_records(&records, &mut content, conversation, assistant_id, cancel, &mut on_event)
                .await;
            if cancel.is_cancelled() {
                return cancelled(content, &mut on_event);
            }
            if exhausted || matches!(flow, Flow::Finished) {
                break;
            }
        }

        info!(%assistant_id, content_len = content.len(), "Completion stream finished");
        on_event(ChatEvent::State {
            state: ChatState::Completed,
        });
        ChatOutcome {
            state: ChatState::Completed,
            content,
        }
    }

    /// Returns `Finished` on `[DONE]`, a finish reason, or cancellation
    async fn apply_records<F>(
        &self,
        records: &[String],
        content: &mut String,
        conversation: &SharedConversation,
        assistant_id: Uuid,
        cancel: &CancellationToken,
        on_event: &mut F,
    ) -> Flow
    where
        F: FnMut(ChatEvent) + Send,
    {
        for record in records {
            match StreamRecord::parse(record) {
                StreamRecord::Ignored => {}
                StreamRecord::Done => return Flow::Finished,
                StreamRecord::Malformed { payload, error } => {
                    warn!(%error, payload = %payload, "Skipping malformed stream chunk");
                }
                StreamRecord::Chunk { delta, finish_reason } => {
                    if let Some(delta) = delta {
                        if cancel.is_cancelled() {
                            return Flow::Finished;
                        }
                        content.push_str(&delta);
                        conversation.write().await.set_content(assistant_id, content.clone());
                        on_event(ChatEvent::Delta {
                            delta,
                            content: content.clone(),
                        });
                    }
                    if let Some(reason) = finish_reason {
                        debug!(%reason, "Stream reported finish reason");
                        return Flow::Finished;
                    }
                }
            }
        }
        Flow::Continue
    }
}

fn cancelled<F>(content: String, on_event: &mut F) -> ChatOutcome
where
    F: FnMut(ChatEvent),
{
    info!(content_len = content.len(), "Completion stream cancelled");
    on_event(ChatEvent::State {
        state: ChatState::Cancelled,
    });
    ChatOutcome {
        state: ChatState::Cancelled,
        content,
    }
}

async fn fail<F>(
    error: AppError,
    conversation: &SharedConversation,
    assistant_id: Uuid,
    cancel: &CancellationToken,
    on_event: &mut F,
) -> ChatOutcome
where
    F: FnMut(ChatEvent),
{
    let detail = error.to_string();
    warn!(error = %detail, %assistant_id, "Chat completion failed");

    let content = apology(&detail);
    if !cancel.is_cancelled() {
        conversation.write().await.set_content(assistant_id, content.clone());
    }

    let state = ChatState::Failed { error: detail };
    on_event(ChatEvent::State { state: state.clone() });
    ChatOutcome { state, content }
}
