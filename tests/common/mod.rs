//! Shared test utilities for integration tests.
//!
//! Not all functions are used by every test file, but they're shared across tests.
#![allow(dead_code)]

use std::time::Duration;

use anonchat::ClientConfig;
use serde_json::{Value, json};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CHALLENGE_PATH: &str = "/backend-anon/sentinel/chat-requirements";
pub const CONVERSATION_PATH: &str = "/backend-anon/conversation";

/// Client config pointing at the mock server with fast retries.
pub fn test_config(server: &MockServer) -> ClientConfig {
    let mut config = ClientConfig::default()
        .with_base_url(server.uri())
        .with_rng_seed(7);
    config.session_attempts = 3;
    config.session_retry_delay = Duration::from_millis(10);
    config.request_timeout = Duration::from_secs(10);
    config
}

/// Challenge response body.
pub fn challenge_body(seed: &str, difficulty: &str, token: &str) -> Value {
    json!({
        "persona": "chatgpt-noauth",
        "token": token,
        "proofofwork": { "required": true, "seed": seed, "difficulty": difficulty },
    })
}

/// Mount a challenge endpoint that always succeeds.
pub async fn mount_session(server: &MockServer, seed: &str, difficulty: &str, token: &str) {
    Mock::given(method("POST"))
        .and(path(CHALLENGE_PATH))
        .and(header_exists("oai-device-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(challenge_body(seed, difficulty, token)))
        .mount(server)
        .await;
}

/// One `data:` line for an event carrying `content` with `status`.
pub fn event_line(content: &str, status: &str) -> String {
    let event = json!({
        "message": {
            "id": "msg-1",
            "author": { "role": "assistant" },
            "content": { "content_type": "text", "parts": [content] },
            "status": status,
            "metadata": {},
        },
        "conversation_id": "conv-1",
        "error": null,
    });
    format!("data: {}", event)
}

/// One `data:` line for a finished event, optionally with a finish type.
pub fn finished_line(content: &str, finish_type: Option<&str>) -> String {
    let mut metadata = json!({});
    if let Some(kind) = finish_type {
        metadata["finish_details"] = json!({ "type": kind, "stop_tokens": [100260] });
    }
    let event = json!({
        "message": {
            "id": "msg-1",
            "author": { "role": "assistant" },
            "content": { "content_type": "text", "parts": [content] },
            "status": "finished_successfully",
            "metadata": metadata,
        },
        "conversation_id": "conv-1",
        "error": null,
    });
    format!("data: {}", event)
}

/// Full stream body: lines separated by blank lines, then the sentinel.
pub fn stream_body(lines: &[String]) -> String {
    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push_str("\n\n");
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Response template for a streamed conversation body.
pub fn stream_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/event-stream; charset=utf-8")
}

/// Counts characters; makes usage numbers easy to predict.
pub fn char_tokens(text: &str) -> usize {
    text.chars().count()
}
