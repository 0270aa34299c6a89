// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Wire protocol for the chat streaming endpoint
//!
//! The server emits Server-Sent Events framed as `data: <json>\n\n`. Every
//! stream starts with exactly one `conversationId` event, carries zero or
//! more `chunk` events, at most one `usage` event, and ends with exactly one
//! terminal event: `done` on success or `error` on failure (no `done`
//! follows an `error`). Both the encoder and the client decoder live off
//! the types in this module.

use serde::{Deserialize, Serialize};

/// Frame delimiter between SSE events.
pub const FRAME_DELIMITER: &str = "\n\n";

/// Field prefix carrying the JSON payload of a frame.
pub const DATA_PREFIX: &str = "data: ";

/// Request body for `POST /api/chat/stream`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// User message, must be non-blank after trimming
    pub message: String,

    /// Existing conversation ID; a new conversation is created when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// Base64 image data URIs (`data:<mime>;base64,<payload>`), max 5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data_uris: Option<Vec<String>>,
}

/// A single event on the chat stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireEvent {
    /// Conversation identifier, always the first event of a stream
    #[serde(rename_all = "camelCase")]
    ConversationId { conversation_id: String },

    /// Incremental text content
    Chunk { content: String },

    /// Token usage, emitted at most once before the terminal event
    #[serde(rename_all = "camelCase")]
    Usage {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
    },

    /// Successful completion marker
    Done,

    /// Terminal failure carrying a user-safe message
    Error { message: String },
}

impl WireEvent {
    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WireEvent::Done | WireEvent::Error { .. })
    }

    /// Encode this event as a complete SSE frame.
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).expect("wire event serializes");
        format!("{DATA_PREFIX}{json}{FRAME_DELIMITER}")
    }
}

/// Extract and decode the `data:` payload of one SSE frame.
///
/// Returns `Ok(None)` for frames without a data field (SSE comments and
/// keep-alives); a data payload that fails to decode is an error, since a
/// half-understood stream cannot be resynchronized.
pub fn decode_frame(frame: &str) -> Result<Option<WireEvent>, serde_json::Error> {
    for line in frame.lines() {
        if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            return serde_json::from_str(payload).map(Some);
        }
        // Tolerate the field form without a space after the colon.
        if let Some(payload) = line.strip_prefix("data:") {
            return serde_json::from_str(payload.trim_start()).map(Some);
        }
    }
    Ok(None)
}
