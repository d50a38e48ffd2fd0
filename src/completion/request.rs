//! Conversation request body.

use serde::Serialize;
use uuid::Uuid;

use super::types::{ChatMessage, Role};

/// Model requested from the backend.
pub const BACKEND_MODEL: &str = "text-davinci-002-render-sha";

const TIMEZONE_OFFSET_MIN: i32 = -180;

#[derive(Debug, Serialize)]
pub struct ConversationRequest<'a> {
    action: &'static str,
    messages: Vec<ConversationMessage<'a>>,
    parent_message_id: String,
    model: &'static str,
    timezone_offset_min: i32,
    suggestions: Vec<String>,
    history_and_training_disabled: bool,
    conversation_mode: ConversationMode,
    websocket_request_id: String,
}

#[derive(Debug, Serialize)]
struct ConversationMessage<'a> {
    author: Author,
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
struct Author {
    role: Role,
}

#[derive(Debug, Serialize)]
struct MessageContent<'a> {
    content_type: &'static str,
    parts: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct ConversationMode {
    kind: &'static str,
}

impl<'a> ConversationRequest<'a> {
    /// Body for a fresh conversation with new random correlation ids.
    pub fn new(messages: &'a [ChatMessage]) -> Self {
        Self {
            action: "next",
            messages: messages
                .iter()
                .map(|m| ConversationMessage {
                    author: Author { role: m.role },
                    content: MessageContent {
                        content_type: "text",
                        parts: [m.content.as_str()],
                    },
                })
                .collect(),
            parent_message_id: Uuid::new_v4().to_string(),
            model: BACKEND_MODEL,
            timezone_offset_min: TIMEZONE_OFFSET_MIN,
            suggestions: Vec::new(),
            history_and_training_disabled: true,
            conversation_mode: ConversationMode {
                kind: "primary_assistant",
            },
            websocket_request_id: Uuid::new_v4().to_string(),
        }
    }
}
