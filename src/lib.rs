// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Brook - streaming web chat against a hosted AI agent.
//!
//! This crate exposes both halves of the streaming subsystem:
//! - the `brook` server binary (`src/main.rs`): the agent gateway and its
//!   SSE chat endpoint
//! - the client runtime consumed by frontends: wire decoding, chat state,
//!   and the send/stream/cancel orchestrator
//!
//! Architecture highlights:
//! - `agent`: gateway with the cached agent handle, attachment validation,
//!   and the completion-provider abstraction (remote + mock)
//! - `server`: axum router encoding gateway streams as SSE wire events
//! - `client`: incremental SSE decoder, pure chat state machine, and the
//!   orchestrator driving them
//! - `wire`: the event protocol shared by encoder and decoder

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod server;
pub mod wire;

pub use error::{BrookError, Result};
