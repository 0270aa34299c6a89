// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Remote completion provider
//!
//! Talks to the hosted agent service over HTTP: the agent definition is
//! fetched once from the agents endpoint, completions are streamed from the
//! responses endpoint as Server-Sent Events.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::agent::provider::{
    AgentHandle, CompletionProvider, MessagePayload, ProviderEvent, ProviderStream, UsageInfo,
};
use crate::config::Settings;
use crate::error::{ApiError, BrookError, Result};

/// Production provider speaking the hosted responses protocol
pub struct RemoteProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// Agent definition as returned by `GET /v1/agents/{id}`
#[derive(Debug, Deserialize)]
struct AgentResponse {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    model: String,
    #[serde(default)]
    instructions: Option<String>,
    created_at: i64,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
}

impl RemoteProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.agent_endpoint.clone(), settings.agent_api_key.clone())
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn build_request_body(&self, agent: &AgentHandle, payload: &MessagePayload) -> Value {
        let content: Value = if payload.images.is_empty() {
            Value::String(payload.text.clone())
        } else {
            let mut parts = vec![json!({"type": "input_text", "text": payload.text})];
            for image in &payload.images {
                // The responses endpoint takes the data URI as a plain
                // string, not wrapped in an object.
                parts.push(json!({"type": "input_image", "image_url": image.data_uri}));
            }
            Value::Array(parts)
        };

        json!({
            "input": [{"role": "user", "content": content}],
            "agent": {"name": agent.name, "type": "agent_reference"},
            "stream": true,
        })
    }

    fn parse_error(status: u16, body: &str) -> BrookError {
        match status {
            401 | 403 => BrookError::Api(ApiError::AuthenticationFailed),
            408 => BrookError::Api(ApiError::Timeout),
            _ => BrookError::Api(ApiError::ServerError {
                status,
                message: extract_error_message(body)
                    .unwrap_or_else(|| "unexpected provider response".to_string()),
            }),
        }
    }
}

#[async_trait]
impl CompletionProvider for RemoteProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn load_agent(&self, agent_id: &str) -> Result<AgentHandle> {
        let url = format!("{}/v1/agents/{agent_id}", self.base_url);
        debug!(url = %url, "Fetching agent definition");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        let agent: AgentResponse = response.json().await.map_err(|e| {
            BrookError::Api(ApiError::InvalidResponse(format!(
                "agent definition did not parse: {e}"
            )))
        })?;

        Ok(AgentHandle {
            created_at: Utc
                .timestamp_opt(agent.created_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
            id: agent.id,
            name: agent.name,
            description: agent.description,
            model: agent.model,
            instructions: agent.instructions,
            metadata: agent.metadata,
        })
    }

    async fn stream_completion(
        &self,
        agent: &AgentHandle,
        payload: MessagePayload,
    ) -> Result<ProviderStream> {
        let url = format!("{}/v1/responses", self.base_url);
        let body = self.build_request_body(agent, &payload);

        let response = self
            .authorize(self.client.post(&url))
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status, &body));
        }

        let byte_stream = response.bytes_stream();

        let event_stream = byte_stream
            .map(|result| {
                result.map_err(|e| BrookError::Api(ApiError::StreamError(e.to_string())))
            })
            .scan(String::new(), |buffer, result| {
                let chunk = match result {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                    Err(e) => return futures::future::ready(Some(vec![Err(e)])),
                };

                buffer.push_str(&chunk);

                let mut events = Vec::new();

                // Parse SSE events from buffer
                while let Some(pos) = buffer.find("\n\n") {
                    let event_str = buffer[..pos].to_string();
                    *buffer = buffer[pos + 2..].to_string();

                    if let Some(event) = parse_sse_event(&event_str) {
                        events.push(Ok(event));
                    }
                }

                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }
}

fn map_transport_error(e: reqwest::Error) -> BrookError {
    if e.is_timeout() {
        BrookError::Api(ApiError::Timeout)
    } else if e.is_connect() {
        BrookError::Api(ApiError::Network(e.to_string()))
    } else {
        BrookError::Http(e)
    }
}

/// Pull a human-readable message out of a provider error body.
fn extract_error_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    parsed["error"]["message"]
        .as_str()
        .or_else(|| parsed["message"].as_str())
        .map(|s| s.to_string())
}

/// Parse one Server-Sent Event from the responses stream.
///
/// The payload JSON carries its own `type` discriminator. Events other than
/// text deltas and the completion record are ignored.
fn parse_sse_event(event_str: &str) -> Option<ProviderEvent> {
    let mut data = None;

    for line in event_str.lines() {
        if let Some(rest) = line.strip_prefix("data: ") {
            data = Some(rest.to_string());
        }
    }

    let data = data?;
    if data.trim() == "[DONE]" {
        return None;
    }

    let parsed: Value = match serde_json::from_str(&data) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Skipping unparsable provider event");
            return None;
        }
    };

    match parsed["type"].as_str()? {
        "response.output_text.delta" => {
            let delta = parsed["delta"].as_str()?;
            if delta.is_empty() {
                None
            } else {
                Some(ProviderEvent::Delta(delta.to_string()))
            }
        }
        "response.completed" => {
            let usage = &parsed["response"]["usage"];
            Some(ProviderEvent::Usage(UsageInfo {
                prompt_tokens: usage["input_tokens"].as_u64().unwrap_or(0) as u32,
                completion_tokens: usage["output_tokens"].as_u64().unwrap_or(0) as u32,
                total_tokens: usage["total_tokens"].as_u64().unwrap_or(0) as u32,
            }))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_text_delta() {
        let event = "event: response.output_text.delta\ndata: {\"type\":\"response.output_text.delta\",\"delta\":\"Hello\"}";
        assert_eq!(
            parse_sse_event(event),
            Some(ProviderEvent::Delta("Hello".to_string()))
        );
    }

    #[test]
    fn test_parse_completed_with_usage() {
        let event = "data: {\"type\":\"response.completed\",\"response\":{\"usage\":{\"input_tokens\":10,\"output_tokens\":20,\"total_tokens\":30}}}";
        assert_eq!(
            parse_sse_event(event),
            Some(ProviderEvent::Usage(UsageInfo {
                prompt_tokens: 10,
                completion_tokens: 20,
                total_tokens: 30,
            }))
        );
    }

    #[test]
    fn test_parse_completed_without_usage_defaults_to_zero() {
        let event = "data: {\"type\":\"response.completed\",\"response\":{}}";
        assert_eq!(
            parse_sse_event(event),
            Some(ProviderEvent::Usage(UsageInfo::default()))
        );
    }

    #[test]
    fn test_parse_ignores_other_event_types() {
        let event = "data: {\"type\":\"response.created\"}";
        assert_eq!(parse_sse_event(event), None);
    }

    #[test]
    fn test_parse_ignores_empty_delta() {
        let event = "data: {\"type\":\"response.output_text.delta\",\"delta\":\"\"}";
        assert_eq!(parse_sse_event(event), None);
    }

    #[test]
    fn test_parse_ignores_done_sentinel_and_garbage() {
        assert_eq!(parse_sse_event("data: [DONE]"), None);
        assert_eq!(parse_sse_event("data: {not json}"), None);
        assert_eq!(parse_sse_event(": keep-alive"), None);
    }

    #[test]
    fn test_build_request_body_text_only() {
        let provider = RemoteProvider::new("https://example.com", None);
        let agent = test_agent();
        let body = provider.build_request_body(&agent, &MessagePayload::text("hi"));

        assert_eq!(body["input"][0]["role"], "user");
        assert_eq!(body["input"][0]["content"], "hi");
        assert_eq!(body["agent"]["type"], "agent_reference");
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn test_build_request_body_with_images() {
        let provider = RemoteProvider::new("https://example.com", None);
        let agent = test_agent();
        let payload = MessagePayload {
            text: "what is this".to_string(),
            images: vec![crate::agent::attachments::ImageAttachment {
                mime: "image/png".to_string(),
                data: vec![1, 2, 3],
                data_uri: "data:image/png;base64,AQID".to_string(),
            }],
        };

        let body = provider.build_request_body(&agent, &payload);
        let parts = body["input"][0]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "input_text");
        assert_eq!(parts[1]["type"], "input_image");
        assert_eq!(parts[1]["image_url"], "data:image/png;base64,AQID");
    }

    #[test]
    fn test_parse_error_maps_auth_statuses() {
        match RemoteProvider::parse_error(401, "") {
            BrookError::Api(ApiError::AuthenticationFailed) => {}
            other => panic!("expected auth error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_extracts_message() {
        let err = RemoteProvider::parse_error(500, r#"{"error":{"message":"agent exploded"}}"#);
        assert!(err.to_string().contains("agent exploded"));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let provider = RemoteProvider::new("https://example.com/", None);
        assert_eq!(provider.base_url, "https://example.com");
    }

    fn test_agent() -> AgentHandle {
        AgentHandle {
            id: "agent-1".to_string(),
            name: "Assistant".to_string(),
            description: None,
            model: "gpt-test".to_string(),
            instructions: None,
            created_at: Utc::now(),
            metadata: None,
        }
    }
}
