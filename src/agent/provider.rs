// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Completion provider trait and related types
//!
//! Defines the abstraction over the hosted agent service. The gateway only
//! ever talks to this trait; the production implementation is
//! [`crate::agent::remote::RemoteProvider`].

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::agent::attachments::ImageAttachment;
use crate::error::Result;

/// Token usage statistics for one completion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens produced in the completion
    pub completion_tokens: u32,
    /// Total billed tokens
    pub total_tokens: u32,
}

/// Agent definition as loaded from the provider
///
/// Loaded at most once per process and cached by the gateway.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    /// Provider-assigned agent identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Optional description
    pub description: Option<String>,
    /// Model backing the agent
    pub model: String,
    /// System instructions, if exposed by the provider
    pub instructions: Option<String>,
    /// Creation time of the agent definition
    pub created_at: DateTime<Utc>,
    /// Free-form provider metadata
    pub metadata: Option<HashMap<String, String>>,
}

/// Agent metadata served to the UI from `GET /api/agent`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    pub id: String,
    pub object: String,
    pub created_at: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl AgentMetadata {
    /// Build the UI-facing metadata view of an agent handle.
    pub fn from_handle(handle: &AgentHandle) -> Self {
        Self {
            id: handle.id.clone(),
            object: "agent".to_string(),
            created_at: handle.created_at.timestamp(),
            name: handle.name.clone(),
            description: handle.description.clone(),
            model: handle.model.clone(),
            instructions: handle.instructions.clone(),
            metadata: handle.metadata.clone(),
        }
    }
}

/// Multimodal message payload handed to the provider
#[derive(Debug, Clone)]
pub struct MessagePayload {
    /// User message text
    pub text: String,
    /// Validated image attachments, one content part each
    pub images: Vec<ImageAttachment>,
}

impl MessagePayload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }
}

/// Events produced by a provider completion stream
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// Incremental text delta
    Delta(String),
    /// Usage accounting, arrives once at stream completion
    Usage(UsageInfo),
}

/// Lazy, forward-only, non-restartable stream of provider events
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent>> + Send>>;

/// Abstraction over the hosted completion service
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name for logging (e.g. "remote", "mock")
    fn name(&self) -> &str;

    /// Fetch the agent definition from the provider.
    async fn load_agent(&self, agent_id: &str) -> Result<AgentHandle>;

    /// Open one streaming completion. Every call opens an independent
    /// stream; no state is shared across calls.
    async fn stream_completion(
        &self,
        agent: &AgentHandle,
        payload: MessagePayload,
    ) -> Result<ProviderStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_metadata_from_handle() {
        let handle = AgentHandle {
            id: "agent-1".to_string(),
            name: "Assistant".to_string(),
            description: None,
            model: "gpt-test".to_string(),
            instructions: Some("Be helpful.".to_string()),
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            metadata: None,
        };

        let metadata = AgentMetadata::from_handle(&handle);
        assert_eq!(metadata.object, "agent");
        assert_eq!(metadata.created_at, 1_700_000_000);

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"createdAt\":1700000000"));
        assert!(!json.contains("description"));
    }
}
