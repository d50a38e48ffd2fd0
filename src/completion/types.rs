//! OpenAI-compatible chat types.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use super::aggregator::Aggregate;

/// Model name reported to callers.
pub const REPORTED_MODEL: &str = "gpt-3.5-turbo";

/// Prefix of generated completion ids.
pub const COMPLETION_ID_PREFIX: &str = "chatcmpl-";

const COMPLETION_ID_LENGTH: usize = 28;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `{role, content}` item of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    Stop,
    Length,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub finish_reason: Option<FinishReason>,
    pub message: ChatMessage,
}

/// Token accounting. `total_tokens` is always the sum of the other two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Final result of a completion run, shaped like an OpenAI chat completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub id: String,
    pub created: i64,
    pub model: String,
    pub object: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl CompletionResult {
    /// Build the result from aggregated stream state.
    ///
    /// `created` is when the conversation request was issued.
    pub fn from_aggregate(
        aggregate: Aggregate,
        prompt_tokens: usize,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_completion_id(COMPLETION_ID_PREFIX),
            created: created.timestamp(),
            model: REPORTED_MODEL.to_string(),
            object: "chat.completion".to_string(),
            choices: vec![Choice {
                index: 0,
                finish_reason: aggregate.finish_reason,
                message: ChatMessage::assistant(aggregate.content),
            }],
            usage: Usage::new(prompt_tokens, aggregate.completion_tokens),
        }
    }

    /// Assistant reply text (or the upstream error text).
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default()
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices.first().and_then(|c| c.finish_reason)
    }
}

/// `prefix` followed by 28 random alphanumeric characters.
pub fn generate_completion_id(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(COMPLETION_ID_LENGTH)
        .map(char::from)
        .collect();
    format!("{prefix}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregate(content: &str, finish_reason: Option<FinishReason>, tokens: usize) -> Aggregate {
        Aggregate {
            content: content.to_string(),
            finish_reason,
            completion_tokens: tokens,
            upstream_error: false,
        }
    }

    #[test]
    fn test_completion_id_shape() {
        let id = generate_completion_id(COMPLETION_ID_PREFIX);
        let suffix = id.strip_prefix("chatcmpl-").unwrap();
        assert_eq!(suffix.len(), 28);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_result_serializes_openai_shape() {
        let result = CompletionResult::from_aggregate(
            aggregate("hello", Some(FinishReason::Stop), 2),
            3,
            Utc::now(),
        );
        let value = serde_json::to_value(&result).unwrap();

        assert_eq!(value["object"], "chat.completion");
        assert_eq!(value["model"], "gpt-3.5-turbo");
        assert_eq!(value["choices"][0]["index"], 0);
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert_eq!(value["choices"][0]["message"]["role"], "assistant");
        assert_eq!(value["choices"][0]["message"]["content"], "hello");
        assert_eq!(value["usage"]["prompt_tokens"], 3);
        assert_eq!(value["usage"]["completion_tokens"], 2);
        assert_eq!(value["usage"]["total_tokens"], 5);
    }

    #[test]
    fn test_missing_finish_reason_serializes_as_null() {
        let result = CompletionResult::from_aggregate(aggregate("", None, 0), 0, Utc::now());
        let value = serde_json::to_value(&result).unwrap();
        assert!(value["choices"][0]["finish_reason"].is_null());
        assert_eq!(result.finish_reason(), None);
    }

    #[test]
    fn test_created_is_the_given_instant() {
        let issued = DateTime::from_timestamp(1_712_780_000, 0).unwrap();
        let result = CompletionResult::from_aggregate(aggregate("x", None, 1), 1, issued);
        assert_eq!(result.created, 1_712_780_000);
    }

    #[test]
    fn test_role_round_trips_lowercase() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"system","content":"x"}"#).unwrap();
        assert_eq!(msg, ChatMessage::system("x"));
        assert_eq!(Role::User.to_string(), "user");
    }
}
