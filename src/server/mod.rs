// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! HTTP server for the chat gateway
//!
//! Exposes the streaming chat endpoint, the agent metadata endpoint, and a
//! health probe. Authentication and static assets are handled by outer
//! layers and are not part of this router.

pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::agent::AgentGateway;

/// Shared state for request handlers
pub struct AppState {
    /// Gateway owning the cached agent handle
    pub gateway: AgentGateway,
    /// Surface provider error detail to clients (development only)
    pub include_error_detail: bool,
}

impl AppState {
    pub fn new(gateway: AgentGateway, include_error_detail: bool) -> Self {
        Self {
            gateway,
            include_error_detail,
        }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/agent", get(routes::agent_metadata))
        .route("/api/chat/stream", post(routes::stream_chat))
        .with_state(state)
}
