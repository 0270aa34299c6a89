// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! RemoteProvider against a wiremock provider endpoint.

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use brook::agent::{CompletionProvider, MessagePayload, ProviderEvent, RemoteProvider, UsageInfo};
use brook::error::{ApiError, BrookError};

fn agent_json() -> serde_json::Value {
    json!({
        "id": "agent-1",
        "name": "Weather Assistant",
        "description": "Answers weather questions",
        "model": "gpt-test",
        "instructions": "Be concise.",
        "created_at": 1_700_000_000,
        "metadata": {"team": "demo"}
    })
}

#[tokio::test]
async fn test_load_agent_parses_definition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/agent-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_json()))
        .mount(&server)
        .await;

    let provider = RemoteProvider::new(server.uri(), None);
    let handle = provider.load_agent("agent-1").await.unwrap();

    assert_eq!(handle.id, "agent-1");
    assert_eq!(handle.name, "Weather Assistant");
    assert_eq!(handle.model, "gpt-test");
    assert_eq!(handle.instructions.as_deref(), Some("Be concise."));
    assert_eq!(handle.created_at.timestamp(), 1_700_000_000);
    assert_eq!(
        handle.metadata.unwrap().get("team").map(String::as_str),
        Some("demo")
    );
}

#[tokio::test]
async fn test_load_agent_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/agent-1"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_json()))
        .expect(1)
        .mount(&server)
        .await;

    let provider = RemoteProvider::new(server.uri(), Some("test-key".to_string()));
    provider.load_agent("agent-1").await.unwrap();
}

#[tokio::test]
async fn test_load_agent_maps_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/agent-1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = RemoteProvider::new(server.uri(), None);
    let err = provider.load_agent("agent-1").await.unwrap_err();
    assert!(matches!(
        err,
        BrookError::Api(ApiError::AuthenticationFailed)
    ));
}

#[tokio::test]
async fn test_load_agent_rejects_malformed_definition() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/agents/agent-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let provider = RemoteProvider::new(server.uri(), None);
    let err = provider.load_agent("agent-1").await.unwrap_err();
    assert!(matches!(err, BrookError::Api(ApiError::InvalidResponse(_))));
}

#[tokio::test]
async fn test_stream_completion_parses_deltas_and_usage() {
    let sse_body = concat!(
        "event: response.created\n",
        "data: {\"type\":\"response.created\"}\n\n",
        "event: response.output_text.delta\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"Hel\"}\n\n",
        "event: response.output_text.delta\n",
        "data: {\"type\":\"response.output_text.delta\",\"delta\":\"lo\"}\n\n",
        "event: response.completed\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"usage\":{\"input_tokens\":12,\"output_tokens\":2,\"total_tokens\":14}}}\n\n",
    );

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let provider = RemoteProvider::new(server.uri(), None);
    let agent = load_test_agent(&provider, &server).await;

    let mut stream = provider
        .stream_completion(&agent, MessagePayload::text("hi"))
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event.unwrap());
    }

    assert_eq!(
        events,
        vec![
            ProviderEvent::Delta("Hel".to_string()),
            ProviderEvent::Delta("lo".to_string()),
            ProviderEvent::Usage(UsageInfo {
                prompt_tokens: 12,
                completion_tokens: 2,
                total_tokens: 14,
            }),
        ]
    );
}

#[tokio::test]
async fn test_stream_completion_maps_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"error": {"message": "agent exploded"}})),
        )
        .mount(&server)
        .await;

    let provider = RemoteProvider::new(server.uri(), None);
    let agent = load_test_agent(&provider, &server).await;

    let err = provider
        .stream_completion(&agent, MessagePayload::text("hi"))
        .await
        .err()
        .unwrap();

    match err {
        BrookError::Api(ApiError::ServerError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "agent exploded");
        }
        other => panic!("expected ServerError, got {other:?}"),
    }
}

async fn load_test_agent(
    provider: &RemoteProvider,
    server: &MockServer,
) -> brook::agent::AgentHandle {
    Mock::given(method("GET"))
        .and(path("/v1/agents/agent-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_json()))
        .mount(server)
        .await;
    provider.load_agent("agent-1").await.unwrap()
}
