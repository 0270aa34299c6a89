// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Streaming event client
//!
//! Reads the chat endpoint's response body as an incremental byte stream
//! and reassembles SSE frames into typed [`WireEvent`]s. Frames may be
//! split across arbitrarily many physical reads, including mid-field: the
//! decoder buffers partial trailing data until the `\n\n` delimiter of the
//! next full frame arrives.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{ApiError, BrookError, Result};
use crate::wire::{decode_frame, ChatRequest, WireEvent};

/// Cooperative cancellation handle
///
/// Cloneable; checked before every yielded event. Cancelling interrupts a
/// blocked read immediately and stops the stream, aborting the underlying
/// transport. Events already yielded stay with the caller.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trigger cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Re-arm the token for a new request. A handle held across sends keeps
    /// working; a cancel delivered while idle is discarded here.
    pub(crate) fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Resolve once cancellation is triggered.
    pub async fn cancelled(&self) {
        loop {
            // Register for the wakeup before checking the flag, otherwise a
            // cancel between check and await is lost.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Lazy, finite, non-restartable sequence of wire events
pub type WireEventStream = Pin<Box<dyn Stream<Item = Result<WireEvent>> + Send>>;

/// Decode a byte stream into wire events.
///
/// Splits on the blank-line frame delimiter only when a full frame is
/// buffered; partial trailing data is carried into the next read. Frames
/// without a `data:` field are skipped; a `data:` payload that fails to
/// decode is a stream error.
pub fn decode_wire_stream<S, B>(byte_stream: S) -> impl Stream<Item = Result<WireEvent>>
where
    S: Stream<Item = Result<B>>,
    B: AsRef<[u8]>,
{
    byte_stream
        .scan(String::new(), |buffer, result| {
            let chunk = match result {
                Ok(bytes) => String::from_utf8_lossy(bytes.as_ref()).to_string(),
                Err(e) => return futures::future::ready(Some(vec![Err(e)])),
            };

            buffer.push_str(&chunk);

            let mut events = Vec::new();

            while let Some(pos) = buffer.find("\n\n") {
                let frame = buffer[..pos].to_string();
                *buffer = buffer[pos + 2..].to_string();

                match decode_frame(&frame) {
                    Ok(Some(event)) => events.push(Ok(event)),
                    Ok(None) => {}
                    Err(e) => events.push(Err(BrookError::Api(ApiError::StreamError(format!(
                        "undecodable frame: {e}"
                    ))))),
                }
            }

            futures::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter)
}

/// HTTP client for the chat streaming endpoint
pub struct StreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl StreamClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Open a chat stream for one request.
    ///
    /// The returned sequence terminates after a `done` or `error` event, on
    /// transport closure, or when `cancel` fires, whichever comes first.
    /// Cancellation drops the response body, aborting the connection.
    pub async fn open(&self, request: &ChatRequest, cancel: CancelToken) -> Result<WireEventStream> {
        let url = format!("{}/api/chat/stream", self.base_url);

        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BrookError::Api(ApiError::Network(e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BrookError::Api(ApiError::ServerError {
                status: status.as_u16(),
                message: body,
            }));
        }

        let bytes = response
            .bytes_stream()
            .map(|r| r.map_err(|e| BrookError::Api(ApiError::StreamError(e.to_string()))));
        let events = decode_wire_stream(bytes);

        let stream = async_stream::stream! {
            futures::pin_mut!(events);
            loop {
                if cancel.is_cancelled() {
                    debug!("Chat stream cancelled");
                    break;
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Chat stream cancelled");
                        break;
                    }
                    next = events.next() => match next {
                        Some(Ok(event)) => {
                            let terminal = event.is_terminal();
                            yield Ok(event);
                            if terminal {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            yield Err(e);
                            break;
                        }
                        None => break,
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>>> {
        futures::stream::iter(
            parts
                .iter()
                .map(|p| Ok(p.as_bytes().to_vec()))
                .collect::<Vec<_>>(),
        )
    }

    async fn collect(parts: &[&str]) -> Vec<Result<WireEvent>> {
        decode_wire_stream(chunks(parts)).collect().await
    }

    #[tokio::test]
    async fn test_frame_split_mid_field_reassembles() {
        let events = collect(&["data: {\"typ", "e\":\"chunk\",\"content\":\"x\"}\n\n"]).await;

        assert_eq!(events.len(), 1);
        assert_eq!(
            *events[0].as_ref().unwrap(),
            WireEvent::Chunk {
                content: "x".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_multiple_frames_in_one_read() {
        let events = collect(&[
            "data: {\"type\":\"conversationId\",\"conversationId\":\"c-1\"}\n\ndata: {\"type\":\"chunk\",\"content\":\"Hel\"}\n\ndata: {\"type\":\"done\"}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[0].as_ref().unwrap(),
            WireEvent::ConversationId { .. }
        ));
        assert_eq!(*events[2].as_ref().unwrap(), WireEvent::Done);
    }

    #[tokio::test]
    async fn test_frame_split_at_every_byte() {
        let wire = "data: {\"type\":\"chunk\",\"content\":\"Hello\"}\n\ndata: {\"type\":\"done\"}\n\n";
        let parts: Vec<String> = wire.chars().map(|c| c.to_string()).collect();
        let part_refs: Vec<&str> = parts.iter().map(|s| s.as_str()).collect();

        let events = collect(&part_refs).await;
        assert_eq!(events.len(), 2);
        assert_eq!(
            *events[0].as_ref().unwrap(),
            WireEvent::Chunk {
                content: "Hello".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_partial_trailing_frame_not_emitted() {
        let events = collect(&["data: {\"type\":\"done\"}\n\ndata: {\"type\":\"chu"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(*events[0].as_ref().unwrap(), WireEvent::Done);
    }

    #[tokio::test]
    async fn test_comment_frames_skipped() {
        let events = collect(&[": keep-alive\n\ndata: {\"type\":\"done\"}\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert_eq!(*events[0].as_ref().unwrap(), WireEvent::Done);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_stream_error() {
        let events = collect(&["data: {\"type\":\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[tokio::test]
    async fn test_cancel_token_wakes_waiter() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        token.cancel();

        assert!(handle.await.unwrap());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_token_reset_rearms() {
        let token = CancelToken::new();
        token.cancel();
        assert!(token.is_cancelled());

        token.reset();
        assert!(!token.is_cancelled());
    }
}
