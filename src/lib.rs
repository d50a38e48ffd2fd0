//! anonchat - A client for anonymous conversational-AI backends.
//!
//! # Overview
//!
//! anonchat imitates a browser against a backend that serves unauthenticated
//! users: it acquires an anonymous session and a proof-of-work challenge,
//! solves the puzzle, sends the conversation and folds the `data: <json>`
//! stream into an OpenAI-compatible chat completion with token usage.

pub mod completion;
pub mod config;
pub mod error;
pub mod pow;
pub mod reply;
pub mod retry;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use completion::{ChatClient, ChatMessage, CompletionResult, FinishReason, Role, Tokenizer, Usage};
pub use config::ClientConfig;
pub use error::{CompletionError, ConfigError, ReplyError, SessionError};
pub use pow::{ProofOfWorkSolver, ProofToken};
pub use session::{Session, SessionAcquirer};
