// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Chat state machine
//!
//! A pure reducer holding the canonical chat state: messages, status,
//! error slot, and the id of the message currently being streamed into.
//! All mutation goes through [`ChatState::apply`]; the orchestrator maps
//! wire events to actions and never touches the fields directly.
//!
//! Invariants: at most one message is marked streaming at any time; chunk
//! and usage actions against a missing or finalized message are no-ops; no
//! transition discards accumulated content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::UsageInfo;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle of a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Error,
}

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    /// Mutable while streaming, immutable once finalized
    pub content: String,
    pub status: MessageStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageInfo>,
    /// Wall-clock duration from send to completion, milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::User,
            content: content.into(),
            status: MessageStatus::Complete,
            timestamp: Utc::now(),
            usage: None,
            duration_ms: None,
        }
    }

    /// Empty assistant message awaiting streamed content.
    pub fn assistant_placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: String::new(),
            status: MessageStatus::Streaming,
            timestamp: Utc::now(),
            usage: None,
            duration_ms: None,
        }
    }

    fn is_finalized(&self) -> bool {
        matches!(self.status, MessageStatus::Complete | MessageStatus::Error)
    }
}

/// Structured error surfaced to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatErrorKind {
    /// In-band error event from the gateway
    Stream,
    /// Connection drop or undecodable response
    Transport,
    /// Rejected before sending
    Input,
}

/// Overall chat status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatStatus {
    #[default]
    Idle,
    Sending,
    Streaming,
    Error,
}

/// Actions the orchestrator dispatches into the reducer
#[derive(Debug, Clone)]
pub enum ChatAction {
    /// User submitted a message; leaves idle/error for sending
    SendMessage { id: String, text: String },
    /// Stream opened; create the placeholder assistant message
    StartStream { message_id: String },
    /// Append streamed content to the active message
    StreamChunk { content: String },
    /// Attach usage to the active message, at most once
    AttachUsage { usage: UsageInfo },
    /// Stream finished normally
    StreamComplete { duration_ms: u64 },
    /// Caller aborted the stream; keep partial content
    CancelStream,
    /// Stream or transport failure
    Fail { error: ChatError },
    /// Dismiss the error slot
    ClearError,
    /// Reset the message list
    ClearChat,
}

/// Canonical chat state
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    pub messages: Vec<ChatMessage>,
    pub status: ChatStatus,
    pub error: Option<ChatError>,
    /// Id of the single message with status streaming, when one exists
    pub streaming_id: Option<String>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the input box accepts a new message.
    pub fn input_enabled(&self) -> bool {
        !matches!(self.status, ChatStatus::Sending | ChatStatus::Streaming)
    }

    /// Generate a fresh message id.
    pub fn next_message_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Apply one action. Unexpected actions for the current status are
    /// dropped rather than panicking; streaming is driven by a remote peer
    /// and the reducer must absorb whatever arrives.
    pub fn apply(&mut self, action: ChatAction) {
        match action {
            ChatAction::SendMessage { id, text } => {
                if !self.input_enabled() {
                    return;
                }
                self.error = None;
                self.messages.push(ChatMessage::user(id, text));
                self.status = ChatStatus::Sending;
            }

            ChatAction::StartStream { message_id } => {
                if self.status != ChatStatus::Sending {
                    return;
                }
                self.messages
                    .push(ChatMessage::assistant_placeholder(message_id.clone()));
                self.streaming_id = Some(message_id);
                self.status = ChatStatus::Streaming;
            }

            ChatAction::StreamChunk { content } => {
                if let Some(message) = self.streaming_message_mut() {
                    message.content.push_str(&content);
                }
            }

            ChatAction::AttachUsage { usage } => {
                if let Some(message) = self.streaming_message_mut() {
                    if message.usage.is_none() {
                        message.usage = Some(usage);
                    }
                }
            }

            ChatAction::StreamComplete { duration_ms } => {
                if let Some(message) = self.streaming_message_mut() {
                    message.status = MessageStatus::Complete;
                    message.duration_ms = Some(duration_ms);
                }
                self.streaming_id = None;
                self.status = ChatStatus::Idle;
            }

            ChatAction::CancelStream => {
                // Partial content is kept; cancellation is a normal
                // termination path, not an error.
                if let Some(message) = self.streaming_message_mut() {
                    message.status = MessageStatus::Complete;
                }
                self.streaming_id = None;
                self.status = ChatStatus::Idle;
            }

            ChatAction::Fail { error } => {
                if let Some(message) = self.streaming_message_mut() {
                    message.status = MessageStatus::Error;
                }
                self.streaming_id = None;
                self.error = Some(error);
                self.status = ChatStatus::Error;
            }

            ChatAction::ClearError => {
                self.error = None;
                if self.status == ChatStatus::Error {
                    self.status = ChatStatus::Idle;
                }
            }

            ChatAction::ClearChat => {
                self.messages.clear();
                self.error = None;
                self.streaming_id = None;
                self.status = ChatStatus::Idle;
            }
        }
    }

    /// The message currently being streamed into, unless it was already
    /// finalized (defensive: late chunks must not resurrect a message).
    fn streaming_message_mut(&mut self) -> Option<&mut ChatMessage> {
        let id = self.streaming_id.clone()?;
        self.messages
            .iter_mut()
            .find(|m| m.id == id && !m.is_finalized())
    }
}
