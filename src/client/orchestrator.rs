// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Chat orchestrator
//!
//! Drives the send/stream/cancel lifecycle: sends the request through the
//! stream client, maps wire events to state-machine actions, measures the
//! reply duration, and turns cancellation or failure into the single
//! corresponding action. The UI observes [`ChatOrchestrator::state`] and
//! keeps the input disabled while a message is in flight.

use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::client::state::{ChatAction, ChatError, ChatErrorKind, ChatState, ChatStatus};
use crate::client::stream::{CancelToken, StreamClient};
use crate::error::{BrookError, Result};
use crate::wire::{ChatRequest, WireEvent};

/// Client-side driver of one chat conversation
pub struct ChatOrchestrator {
    client: StreamClient,
    state: ChatState,
    conversation_id: Option<String>,
    cancel: CancelToken,
}

impl ChatOrchestrator {
    pub fn new(client: StreamClient) -> Self {
        Self {
            client,
            state: ChatState::new(),
            conversation_id: None,
            cancel: CancelToken::new(),
        }
    }

    /// Current chat state.
    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Conversation id recorded from the server, if any exchange completed
    /// far enough to receive one.
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Cancellation handle for the in-flight stream. The handle stays valid
    /// across sends; triggering it while idle is a no-op.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Abort the in-flight stream, keeping any partial content.
    pub fn cancel_stream(&self) {
        self.cancel.cancel();
    }

    /// Reset the message list and conversation id.
    pub fn clear_chat(&mut self) {
        self.state.apply(ChatAction::ClearChat);
        self.conversation_id = None;
    }

    /// Clear only the error slot, leaving messages untouched.
    pub fn clear_error(&mut self) {
        self.state.apply(ChatAction::ClearError);
    }

    /// Send a message and stream the reply to completion, cancellation, or
    /// failure. Returns `Err` only when the send is rejected outright
    /// (input disabled); stream failures surface through the error state.
    pub async fn send_message(
        &mut self,
        text: impl Into<String>,
        image_data_uris: Option<Vec<String>>,
    ) -> Result<()> {
        if !self.state.input_enabled() {
            return Err(BrookError::InvalidInput(
                "a message is already in flight".to_string(),
            ));
        }

        let text = text.into();
        self.cancel.reset();

        self.state.apply(ChatAction::SendMessage {
            id: ChatState::next_message_id(),
            text: text.clone(),
        });

        let request = ChatRequest {
            message: text,
            conversation_id: self.conversation_id.clone(),
            image_data_uris,
        };

        let started = Instant::now();

        let mut events = match self.client.open(&request, self.cancel.clone()).await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Failed to open chat stream");
                self.state.apply(ChatAction::Fail {
                    error: ChatError {
                        kind: ChatErrorKind::Transport,
                        message: e.to_string(),
                    },
                });
                return Ok(());
            }
        };

        self.state.apply(ChatAction::StartStream {
            message_id: ChatState::next_message_id(),
        });

        while let Some(item) = events.next().await {
            match item {
                Ok(WireEvent::ConversationId { conversation_id }) => {
                    debug!(%conversation_id, "Recorded conversation id");
                    self.conversation_id = Some(conversation_id);
                }
                Ok(WireEvent::Chunk { content }) => {
                    self.state.apply(ChatAction::StreamChunk { content });
                }
                Ok(WireEvent::Usage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens,
                }) => {
                    self.state.apply(ChatAction::AttachUsage {
                        usage: crate::agent::UsageInfo {
                            prompt_tokens,
                            completion_tokens,
                            total_tokens,
                        },
                    });
                }
                Ok(WireEvent::Done) => {
                    self.state.apply(ChatAction::StreamComplete {
                        duration_ms: started.elapsed().as_millis() as u64,
                    });
                    return Ok(());
                }
                Ok(WireEvent::Error { message }) => {
                    self.state.apply(ChatAction::Fail {
                        error: ChatError {
                            kind: ChatErrorKind::Stream,
                            message,
                        },
                    });
                    return Ok(());
                }
                Err(e) => {
                    self.state.apply(ChatAction::Fail {
                        error: ChatError {
                            kind: ChatErrorKind::Transport,
                            message: e.to_string(),
                        },
                    });
                    return Ok(());
                }
            }
        }

        // The stream ended without a terminal event: either the caller
        // cancelled, or the connection dropped mid-reply.
        if self.state.status == ChatStatus::Streaming || self.state.status == ChatStatus::Sending {
            if self.cancel.is_cancelled() {
                self.state.apply(ChatAction::CancelStream);
            } else {
                self.state.apply(ChatAction::Fail {
                    error: ChatError {
                        kind: ChatErrorKind::Transport,
                        message: "connection closed before the reply completed".to_string(),
                    },
                });
            }
        }

        Ok(())
    }
}
