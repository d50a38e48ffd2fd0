//! Streamed chat completions over an anonymous session.

pub mod aggregator;
pub mod client;
pub mod request;
pub mod tokenizer;
pub mod types;

pub use aggregator::{Aggregate, EventStatus, ParsedEvent, ResponseAggregator, is_heartbeat};
pub use client::ChatClient;
pub use request::{BACKEND_MODEL, ConversationRequest};
pub use tokenizer::{CharEstimateTokenizer, Tokenizer};
pub use types::{ChatMessage, Choice, CompletionResult, FinishReason, Role, Usage};
