// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Agent gateway
//!
//! Owns the lazily loaded, cached agent handle and opens one provider
//! stream per chat request. The handle is loaded at most once per process:
//! the first caller performs the remote fetch while concurrent callers wait
//! on the same lock; a failed load is never cached, so the next call
//! retries from scratch.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::attachments::{decode_attachments, validate_image_data_uris};
use crate::agent::provider::{
    AgentHandle, AgentMetadata, CompletionProvider, MessagePayload, ProviderEvent, UsageInfo,
};
use crate::error::{BrookError, Result};

/// Maximum conversation title length before truncation.
const MAX_TITLE_LEN: usize = 50;

/// A conversation created by the gateway
///
/// Referenced, never mutated, by later messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSession {
    /// Opaque conversation identifier
    pub id: String,
    /// Title derived from the first message, if one was supplied
    pub title: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// One streaming reply: a lazy sequence of text deltas plus a usage slot
/// filled as a side effect of consuming the stream to completion.
pub struct MessageStream {
    events: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
    usage: Arc<Mutex<Option<UsageInfo>>>,
}

impl std::fmt::Debug for MessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageStream")
            .field("usage", &self.usage())
            .finish_non_exhaustive()
    }
}

impl MessageStream {
    /// Usage captured from the provider, available once the stream has
    /// reported completion.
    pub fn usage(&self) -> Option<UsageInfo> {
        *self.usage.lock().unwrap()
    }
}

impl Stream for MessageStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.as_mut().poll_next(cx)
    }
}

/// Gateway in front of the completion provider
pub struct AgentGateway {
    provider: Arc<dyn CompletionProvider>,
    agent_id: String,
    agent: RwLock<Option<Arc<AgentHandle>>>,
    metadata: RwLock<Option<AgentMetadata>>,
    sessions: RwLock<HashMap<String, ConversationSession>>,
    closed: AtomicBool,
}

impl AgentGateway {
    pub fn new(provider: Arc<dyn CompletionProvider>, agent_id: impl Into<String>) -> Self {
        Self {
            provider,
            agent_id: agent_id.into(),
            agent: RwLock::new(None),
            metadata: RwLock::new(None),
            sessions: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Reject calls after shutdown.
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrookError::Gateway("gateway is closed".to_string()));
        }
        Ok(())
    }

    /// Mark the gateway closed; every subsequent operation fails.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        info!("Agent gateway closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Drop the cached agent handle and metadata.
    ///
    /// The next call reloads from the provider. Nothing invokes this on the
    /// serving path today; the cache has no expiry.
    pub async fn invalidate(&self) {
        *self.agent.write().await = None;
        *self.metadata.write().await = None;
        info!("Agent cache invalidated");
    }

    /// Get the agent handle, loading it on first use.
    ///
    /// Idempotent: the first caller performs the fetch under the write
    /// lock while concurrent callers queue behind it and return the same
    /// cached handle once it is ready. Subsequent calls take the read-lock
    /// fast path. A load failure leaves the cache empty.
    pub async fn ensure_loaded(&self) -> Result<Arc<AgentHandle>> {
        self.ensure_open()?;

        if let Some(agent) = self.agent.read().await.as_ref() {
            return Ok(Arc::clone(agent));
        }

        let mut slot = self.agent.write().await;

        // Double-check after acquiring the lock: another caller may have
        // completed the load while this one waited.
        if let Some(agent) = slot.as_ref() {
            return Ok(Arc::clone(agent));
        }

        info!(agent_id = %self.agent_id, "Loading agent from provider");
        let handle = Arc::new(self.provider.load_agent(&self.agent_id).await?);
        info!(agent_id = %self.agent_id, name = %handle.name, "Agent loaded");

        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Warm the cache at startup. Failures are logged, never fatal: the
    /// first request will retry the load.
    pub async fn preload(&self) {
        match self.ensure_loaded().await {
            Ok(_) => info!("Agent pre-loaded at startup"),
            Err(e) => warn!(error = %e, "Failed to pre-load agent at startup"),
        }
    }

    /// Agent metadata for the UI, cached indefinitely after first success.
    pub async fn get_metadata(&self) -> Result<AgentMetadata> {
        self.ensure_open()?;

        if let Some(metadata) = self.metadata.read().await.as_ref() {
            debug!("Returning cached agent metadata");
            return Ok(metadata.clone());
        }

        let handle = self.ensure_loaded().await?;
        let metadata = AgentMetadata::from_handle(&handle);

        *self.metadata.write().await = Some(metadata.clone());
        info!("Cached agent metadata");
        Ok(metadata)
    }

    /// Create a new conversation, deriving a title from the first message
    /// when one is supplied.
    pub async fn create_conversation(
        &self,
        first_message: Option<&str>,
    ) -> Result<ConversationSession> {
        self.ensure_open()?;

        let session = ConversationSession {
            id: Uuid::new_v4().to_string(),
            title: first_message.map(derive_title),
            created_at: Utc::now(),
        };

        info!(conversation_id = %session.id, "Created conversation");
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// Look up a conversation created by this gateway.
    pub async fn conversation(&self, id: &str) -> Option<ConversationSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Open one streaming reply for a message.
    ///
    /// Fails before any provider call on blank input or invalid
    /// attachments. The returned stream is forward-only and owns its
    /// provider stream; dropping it releases the underlying connection.
    pub async fn stream_message(
        &self,
        conversation_id: &str,
        message: &str,
        image_data_uris: Option<&[String]>,
    ) -> Result<MessageStream> {
        self.ensure_open()?;

        if message.trim().is_empty() {
            return Err(BrookError::InvalidInput(
                "Message cannot be null or whitespace".to_string(),
            ));
        }

        let uris = image_data_uris.unwrap_or(&[]);
        let validation_errors = validate_image_data_uris(uris);
        if !validation_errors.is_empty() {
            warn!(
                conversation_id,
                errors = validation_errors.len(),
                "Image validation failed"
            );
            return Err(BrookError::InvalidAttachments(validation_errors));
        }

        let agent = self.ensure_loaded().await?;

        info!(
            conversation_id,
            image_count = uris.len(),
            "Streaming response"
        );

        let payload = MessagePayload {
            text: message.to_string(),
            images: decode_attachments(uris),
        };

        let mut inner = self.provider.stream_completion(&agent, payload).await?;

        let usage = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&usage);
        let conversation_id = conversation_id.to_string();

        let events = async_stream::stream! {
            while let Some(item) = inner.next().await {
                match item {
                    Ok(ProviderEvent::Delta(text)) => yield Ok(text),
                    Ok(ProviderEvent::Usage(info)) => {
                        debug!(
                            prompt = info.prompt_tokens,
                            completion = info.completion_tokens,
                            total = info.total_tokens,
                            "Captured usage info"
                        );
                        *slot.lock().unwrap() = Some(info);
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
            debug!(conversation_id = %conversation_id, "Completed streaming response");
        };

        Ok(MessageStream {
            events: Box::pin(events),
            usage,
        })
    }
}

/// Derive a conversation title from its first message: truncate to
/// [`MAX_TITLE_LEN`] characters and append an ellipsis when truncated.
fn derive_title(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.chars().count() > MAX_TITLE_LEN {
        let truncated: String = trimmed.chars().take(MAX_TITLE_LEN).collect();
        format!("{truncated}...")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_short_message_unchanged() {
        assert_eq!(derive_title("Hello there"), "Hello there");
    }

    #[test]
    fn test_title_exactly_fifty_chars_unchanged() {
        let message = "a".repeat(50);
        assert_eq!(derive_title(&message), message);
    }

    #[test]
    fn test_title_truncated_with_ellipsis() {
        let message = "b".repeat(51);
        let title = derive_title(&message);
        assert_eq!(title.chars().count(), 53);
        assert!(title.ends_with("..."));
        assert!(title.starts_with(&"b".repeat(50)));
    }

    #[test]
    fn test_title_counts_characters_not_bytes() {
        let message = "é".repeat(51);
        let title = derive_title(&message);
        assert_eq!(title.chars().count(), 53);
    }
}
