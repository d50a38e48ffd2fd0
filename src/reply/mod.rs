//! Interpreting model replies.

pub mod draft;
pub mod json;

pub use draft::{CommitDraft, DRAFT_INSTRUCTIONS, build_draft_messages, parse_draft};
pub use json::{extract_json, parse_json_reply};
