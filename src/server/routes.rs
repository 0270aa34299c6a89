// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Request handlers
//!
//! The chat handler turns one gateway stream into the wire protocol: a
//! `conversationId` event first, one `chunk` per delta, then `usage` (when
//! captured) and `done`. Any failure collapses into exactly one `error`
//! event and the stream ends without `done`. Events are written unbuffered;
//! the response is a persistent, uncached event stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::{Stream, StreamExt};
use serde_json::json;
use tracing::{error, info, warn};

use crate::agent::AgentMetadata;
use crate::error::BrookError;
use crate::server::AppState;
use crate::wire::{ChatRequest, WireEvent};

/// `GET /api/health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// `GET /api/agent`
///
/// Served from the gateway's indefinite metadata cache after the first
/// successful load.
pub async fn agent_metadata(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AgentMetadata>, (StatusCode, Json<serde_json::Value>)> {
    match state.gateway.get_metadata().await {
        Ok(metadata) => Ok(Json(metadata)),
        Err(e) => {
            error!(error = %e, "Failed to get agent metadata");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.user_message(state.include_error_detail)})),
            ))
        }
    }
}

/// `POST /api/chat/stream`
///
/// SSE event sequence:
/// 1. `conversationId` - new or existing conversation ID
/// 2. `chunk` (zero or more) - text content deltas
/// 3. `usage` - token usage, at most once
/// 4. `done` - completion marker
///
/// Or on failure: a single `error` event.
pub async fn stream_chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(chat_event_stream(state, request)),
    )
}

/// Encode one chat exchange as a stream of SSE events.
fn chat_event_stream(
    state: Arc<AppState>,
    request: ChatRequest,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        // Create or reuse the conversation before anything is streamed so
        // the client always learns the id first.
        let conversation_id = match request.conversation_id {
            Some(id) => id,
            None => {
                match state.gateway.create_conversation(Some(&request.message)).await {
                    Ok(session) => session.id,
                    Err(e) => {
                        yield Ok(error_event(&state, &e));
                        return;
                    }
                }
            }
        };

        yield Ok(sse_event(&WireEvent::ConversationId {
            conversation_id: conversation_id.clone(),
        }));

        let mut deltas = match state
            .gateway
            .stream_message(
                &conversation_id,
                &request.message,
                request.image_data_uris.as_deref(),
            )
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(%conversation_id, error = %e, "Rejected chat request");
                yield Ok(error_event(&state, &e));
                return;
            }
        };

        while let Some(item) = deltas.next().await {
            match item {
                Ok(content) => {
                    yield Ok(sse_event(&WireEvent::Chunk { content }));
                }
                Err(e) => {
                    error!(%conversation_id, error = %e, "Error in chat stream");
                    yield Ok(error_event(&state, &e));
                    return;
                }
            }
        }

        if let Some(usage) = deltas.usage() {
            yield Ok(sse_event(&WireEvent::Usage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            }));
        }

        info!(%conversation_id, "Chat stream completed");
        yield Ok(sse_event(&WireEvent::Done));
    }
}

fn sse_event(event: &WireEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        // WireEvent serialization cannot fail; keep the stream well-formed
        // regardless.
        Err(_) => Event::default()
            .data(r#"{"type":"error","message":"internal encoding failure"}"#),
    }
}

fn error_event(state: &AppState, error: &BrookError) -> Event {
    sse_event(&WireEvent::Error {
        message: error.user_message(state.include_error_detail),
    })
}
