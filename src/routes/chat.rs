//! Chat endpoint
//!
//! `POST /api/chat` answers with a server-sent event stream. Each
//! [`ChatEvent`] becomes one event named after its kind (`notice`,
//! `research`, `state`, `delta`) and a final `done` event carries the outcome.
//! Dropping the response (browser disconnect) cancels the turn.

use super::clamp_max_queries;
use crate::chat::{ChatEvent, ChatOptions, ChatOutcome, ChatSession, Conversation};
use crate::models::{AppState, ChatRequest};
use crate::types::{AppError, AppResult};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(post_chat))
        .with_state(state)
}

async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::InvalidRequest("message must not be empty".to_string()));
    }

    let settings = state.settings.load().await;
    let mut options = ChatOptions::from_config(&state.config);
    if let Some(model) = request.model.filter(|m| !m.trim().is_empty()) {
        options.model = model;
    }
    if let Some(web_search) = request.web_search {
        options.web_search = web_search;
    }
    if let Some(max_queries) = request.max_queries {
        options.max_queries = clamp_max_queries(max_queries);
    }
    options.system_prompt = request
        .system_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| settings.effective_system_prompt().to_string());

    info!(
        model = %options.model,
        history_len = request.history.len(),
        web_search = options.web_search,
        "Received chat request"
    );

    let session = ChatSession::with_conversation(
        Conversation::from_history(request.history),
        state.llm.clone(),
        state.search.clone(),
        options,
    );

    let (tx, rx) = mpsc::unbounded_channel::<Event>();
    let cancel = CancellationToken::new();
    let turn_cancel = cancel.clone();

    tokio::spawn(async move {
        let events = tx.clone();
        let outcome = session
            .send_user_message(&message, &turn_cancel, move |event| {
                let _ = events.send(to_sse(&event));
            })
            .await;
        let _ = tx.send(done_event(&outcome));
    });

    // the guard lives as long as the response stream
    let stream = futures::stream::unfold((rx, cancel.drop_guard()), |(mut rx, guard)| async move {
        rx.recv().await.map(|event| (Ok(event), (rx, guard)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: &ChatEvent) -> Event {
    let name = match event {
        ChatEvent::Notice { .. } => "notice",
        ChatEvent::Research { .. } => "research",
        ChatEvent::State { .. } => "state",
        ChatEvent::Delta { .. } => "delta",
    };
    json_event(name, event)
}

fn done_event(outcome: &ChatOutcome) -> Event {
    json_event(
        "done",
        &serde_json::json!({
            "state": outcome.state,
            "content": outcome.content,
        }),
    )
}

fn json_event<T: serde::Serialize>(name: &str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(data) => Event::default().event(name).data(data),
        Err(e) => {
            warn!(error = %e, event = name, "Failed to serialize chat event");
            Event::default().event(name).data("{}")
        }
    }
}
