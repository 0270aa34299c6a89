// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Chat client
//!
//! Consumes the gateway's wire protocol: `stream` reassembles SSE frames
//! from network reads into typed events with cooperative cancellation,
//! `state` holds the canonical chat state as a pure reducer, and
//! `orchestrator` drives the send/stream/cancel lifecycle between them.

pub mod orchestrator;
pub mod state;
pub mod stream;

pub use orchestrator::ChatOrchestrator;
pub use state::{ChatAction, ChatError, ChatErrorKind, ChatMessage, ChatState, ChatStatus, MessageStatus, Role};
pub use stream::{decode_wire_stream, CancelToken, StreamClient};
