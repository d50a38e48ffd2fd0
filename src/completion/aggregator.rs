//! Folding decoded stream events into a completion.
//!
//! Every event carries the *whole* reply generated so far rather than a
//! delta, so the aggregator keeps the longest content seen and counts tokens
//! only for the part that was not counted before.

use std::ops::ControlFlow;
use std::pin::pin;
use std::sync::LazyLock;

use futures::{Stream, StreamExt};
use regex_lite::Regex;
use serde_json::Value;
use tracing::debug;

use super::tokenizer::Tokenizer;
use super::types::{ChatMessage, FinishReason};

/// Prefix of the content returned when the backend reports an error.
pub const UPSTREAM_ERROR_PREFIX: &str = "Error message from OpenAI: ";

static HEARTBEAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}.\d{6}$").expect("Invalid regex")
});

/// Status of the assistant message in one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventStatus {
    InProgress,
    FinishedSuccessfully,
    Other(String),
    Missing,
}

impl EventStatus {
    fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("in_progress") => EventStatus::InProgress,
            Some("finished_successfully") => EventStatus::FinishedSuccessfully,
            Some(other) => EventStatus::Other(other.to_string()),
            None => EventStatus::Missing,
        }
    }
}

/// Structured view of one decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub error: Option<String>,
    pub content: Option<String>,
    pub status: EventStatus,
    pub finish_type: Option<String>,
}

impl ParsedEvent {
    pub fn parse(message: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(message)?;

        Ok(Self {
            error: upstream_error(&value),
            content: value
                .pointer("/message/content/parts/0")
                .and_then(Value::as_str)
                .map(str::to_string),
            status: EventStatus::parse(value.pointer("/message/status").and_then(Value::as_str)),
            finish_type: value
                .pointer("/message/metadata/finish_details/type")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// Finish reason implied by this event alone.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        match self.status {
            EventStatus::FinishedSuccessfully => match self.finish_type.as_deref() {
                Some("max_tokens") => Some(FinishReason::Length),
                _ => Some(FinishReason::Stop),
            },
            _ => None,
        }
    }
}

/// The `error` field if present and truthy.
fn upstream_error(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Whether a message is a timestamp heartbeat rather than JSON.
pub fn is_heartbeat(message: &str) -> bool {
    HEARTBEAT.is_match(message)
}

/// Part of `content` that extends what was already counted.
fn unseen_suffix<'c>(content: &'c str, seen: &str) -> &'c str {
    if let Some(rest) = content.strip_prefix(seen) {
        return rest;
    }
    if seen.starts_with(content) {
        return "";
    }

    let diverge_at = content
        .char_indices()
        .zip(seen.chars())
        .find(|((_, a), b)| a != b)
        .map(|((idx, _), _)| idx)
        .unwrap_or(content.len());
    &content[diverge_at..]
}

/// Final aggregated state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Longest reply seen, or the formatted upstream error.
    pub content: String,
    pub finish_reason: Option<FinishReason>,
    pub completion_tokens: usize,
    pub upstream_error: bool,
}

/// Consumes decoded messages for one completion.
pub struct ResponseAggregator<'a> {
    prompt: &'a [ChatMessage],
    tokenizer: &'a dyn Tokenizer,
    content: String,
    error: Option<String>,
    finish_reason: Option<FinishReason>,
    completion_tokens: usize,
}

impl<'a> ResponseAggregator<'a> {
    /// `prompt` is used to suppress events that echo an input message.
    pub fn new(prompt: &'a [ChatMessage], tokenizer: &'a dyn Tokenizer) -> Self {
        Self {
            prompt,
            tokenizer,
            content: String::new(),
            error: None,
            finish_reason: None,
            completion_tokens: 0,
        }
    }

    /// Apply one message. `Break` means the run is over and later messages
    /// are ignored.
    pub fn push(&mut self, message: &str) -> ControlFlow<()> {
        if self.error.is_some() {
            return ControlFlow::Break(());
        }
        if is_heartbeat(message) {
            return ControlFlow::Continue(());
        }

        let event = match ParsedEvent::parse(message) {
            Ok(event) => event,
            Err(e) => {
                debug!("Skipping undecodable event ({}): {}", e, message);
                return ControlFlow::Continue(());
            }
        };

        if let Some(error) = event.error {
            debug!("Backend reported an error: {}", error);
            self.error = Some(format!("{UPSTREAM_ERROR_PREFIX}{error}"));
            self.finish_reason = Some(FinishReason::Stop);
            return ControlFlow::Break(());
        }

        // The backend replays input messages as finished events.
        if event.content.as_deref().is_some_and(|c| self.is_prompt_echo(c)) {
            return ControlFlow::Continue(());
        }

        if self.finish_reason.is_none() {
            self.finish_reason = event.finish_reason();
        }

        let content = match event.content {
            Some(c) if !c.is_empty() => c,
            _ => return ControlFlow::Continue(()),
        };

        let delta = unseen_suffix(&content, &self.content);
        if !delta.is_empty() {
            self.completion_tokens += self.tokenizer.count(delta);
        }

        if content.len() > self.content.len() {
            self.content = content;
        }

        ControlFlow::Continue(())
    }

    /// Drive the aggregator over a message stream until it ends or a
    /// terminal event arrives. Transport errors are returned as-is.
    pub async fn consume<S, E>(&mut self, messages: S) -> Result<(), E>
    where
        S: Stream<Item = Result<String, E>>,
    {
        let mut messages = pin!(messages);
        while let Some(message) = messages.next().await {
            if self.push(&message?).is_break() {
                break;
            }
        }
        Ok(())
    }

    pub fn content(&self) -> &str {
        self.error.as_deref().unwrap_or(&self.content)
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn completion_tokens(&self) -> usize {
        self.completion_tokens
    }

    pub fn finish(self) -> Aggregate {
        let upstream_error = self.error.is_some();
        Aggregate {
            content: self.error.unwrap_or(self.content),
            finish_reason: self.finish_reason,
            completion_tokens: self.completion_tokens,
            upstream_error,
        }
    }

    fn is_prompt_echo(&self, content: &str) -> bool {
        self.prompt.iter().any(|m| m.content == content)
    }
}
