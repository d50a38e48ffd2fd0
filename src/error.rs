//! Error types for anonchat modules using thiserror.

use thiserror::Error;

/// Errors from building the HTTP client.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to build HTTP client: {0}")]
    Http(#[source] reqwest::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

/// Errors from anonymous session acquisition.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Challenge request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Challenge endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Challenge response could not be decoded: {0}")]
    InvalidChallenge(String),

    #[error("Could not acquire a session after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<SessionError>,
    },
}

/// Errors from a completion run.
///
/// An `error` event inside the stream is not one of these: it ends the run
/// with a degraded result instead.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Session acquisition failed: {0}")]
    Session(#[from] SessionError),

    #[error("Conversation request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Conversation request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Conversation endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Proof-of-work task failed: {0}")]
    Solver(String),

    #[error("Failed to serialize conversation request: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Errors from interpreting a model reply.
#[derive(Error, Debug)]
pub enum ReplyError {
    #[error("Reply is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Reply JSON is missing a non-empty '{0}' field")]
    MissingField(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_message_includes_last_error() {
        let err = SessionError::RetriesExhausted {
            attempts: 5,
            last: Box::new(SessionError::Status {
                status: 403,
                body: "blocked".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.contains("5 attempt(s)"));
        assert!(msg.contains("HTTP 403"));
    }

    #[test]
    fn session_error_converts_into_completion_error() {
        let err: CompletionError = SessionError::InvalidChallenge("eof".to_string()).into();
        assert!(matches!(err, CompletionError::Session(_)));
    }
}
