// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Mock completion provider for testing
//!
//! Provides a configurable mock implementation of the CompletionProvider
//! trait so gateway, server, and client tests run without a hosted agent.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::agent::provider::{
    AgentHandle, CompletionProvider, MessagePayload, ProviderEvent, ProviderStream, UsageInfo,
};
use crate::error::{ApiError, BrookError, Result};

/// A scripted streaming reply
#[derive(Clone, Debug)]
pub struct MockTurn {
    /// Text deltas yielded in order
    pub deltas: Vec<String>,
    /// Usage reported after the final delta
    pub usage: Option<UsageInfo>,
    /// Pause before each delta (drives cancellation tests)
    pub delta_delay: Option<Duration>,
    /// Yield a stream error after this many deltas
    pub fail_after: Option<usize>,
}

impl MockTurn {
    pub fn with_deltas<I, S>(deltas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(Into::into).collect(),
            usage: None,
            delta_delay: None,
            fail_after: None,
        }
    }

    pub fn usage(mut self, usage: UsageInfo) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn delta_delay(mut self, delay: Duration) -> Self {
        self.delta_delay = Some(delay);
        self
    }

    pub fn failing_after(mut self, deltas: usize) -> Self {
        self.fail_after = Some(deltas);
        self
    }
}

impl Default for MockTurn {
    fn default() -> Self {
        Self::with_deltas(["Hello"]).usage(UsageInfo {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        })
    }
}

/// A mock completion provider for testing
#[derive(Clone)]
pub struct MockProvider {
    /// Scripted turns, consumed front to back; the last one repeats
    turns: Arc<Mutex<Vec<MockTurn>>>,
    /// Number of load_agent calls observed
    load_calls: Arc<AtomicUsize>,
    /// Remaining load_agent calls that should fail
    failing_loads: Arc<AtomicUsize>,
    /// Pause inside load_agent, to widen the single-flight race window
    load_delay: Option<Duration>,
    /// Recorded payloads from stream_completion calls
    recorded_payloads: Arc<Mutex<Vec<MessagePayload>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(Mutex::new(vec![MockTurn::default()])),
            load_calls: Arc::new(AtomicUsize::new(0)),
            failing_loads: Arc::new(AtomicUsize::new(0)),
            load_delay: None,
            recorded_payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_turns(turns: Vec<MockTurn>) -> Self {
        let provider = Self::new();
        *provider.turns.lock().unwrap() = turns;
        provider
    }

    /// Pause inside load_agent so concurrent callers overlap.
    pub fn load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = Some(delay);
        self
    }

    /// Make the next `count` load_agent calls fail.
    pub fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    /// Number of load_agent calls observed so far.
    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    /// Payloads recorded from stream_completion calls.
    pub fn recorded_payloads(&self) -> Vec<MessagePayload> {
        self.recorded_payloads.lock().unwrap().clone()
    }

    fn next_turn(&self) -> MockTurn {
        let mut turns = self.turns.lock().unwrap();
        if turns.len() > 1 {
            turns.remove(0)
        } else {
            turns.first().cloned().unwrap_or_default()
        }
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load_agent(&self, agent_id: &str) -> Result<AgentHandle> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(BrookError::Api(ApiError::Network(
                "mock load failure".to_string(),
            )));
        }

        Ok(AgentHandle {
            id: agent_id.to_string(),
            name: "Mock Assistant".to_string(),
            description: Some("Scripted provider for tests".to_string()),
            model: "mock-model".to_string(),
            instructions: None,
            created_at: Utc::now(),
            metadata: None,
        })
    }

    async fn stream_completion(
        &self,
        _agent: &AgentHandle,
        payload: MessagePayload,
    ) -> Result<ProviderStream> {
        self.recorded_payloads.lock().unwrap().push(payload);

        let turn = self.next_turn();

        let stream = async_stream::stream! {
            for (i, delta) in turn.deltas.iter().enumerate() {
                if turn.fail_after == Some(i) {
                    yield Err(BrookError::Api(ApiError::StreamError(
                        "mock stream failure".to_string(),
                    )));
                    return;
                }
                if let Some(delay) = turn.delta_delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(ProviderEvent::Delta(delta.clone()));
            }

            if turn.fail_after == Some(turn.deltas.len()) {
                yield Err(BrookError::Api(ApiError::StreamError(
                    "mock stream failure".to_string(),
                )));
                return;
            }

            if let Some(usage) = turn.usage {
                yield Ok(ProviderEvent::Usage(usage));
            }
        };

        Ok(Box::pin(stream))
    }
}
