//! Commit message drafts from a staged diff.

use serde::Deserialize;

use crate::completion::ChatMessage;
use crate::error::ReplyError;

use super::json::parse_json_reply;

/// Instructions sent ahead of the diff.
pub const DRAFT_INSTRUCTIONS: &str = "You're an experienced programmer known for your precise and effective commit messages. Review the output of git diff --staged and create a commit message. The commit should include a clear and concise title that accurately summarizes the purpose of the changes, followed by a brief description that outlines the key updates or modifications made. Ensure the description highlights any new functionality, bug fixes, or refactoring, and is no longer than 2 sentences. The commit message must follow best practices for clarity and relevance to maintain a well-organized project history. Return the response in strict JSON format with two keys: 'title' for the commit title and 'description' for the commit description. Example format: {'title': 'Title goes here', 'description': 'Description goes here'}.";

/// A drafted commit message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl CommitDraft {
    /// Title, blank line, description; just the title if there is no body.
    pub fn format(&self) -> String {
        let title = self.title.trim();
        let description = self.description.trim();
        if description.is_empty() {
            title.to_string()
        } else {
            format!("{title}\n\n{description}")
        }
    }
}

/// Single user message: instructions, optional hint, then the diff.
pub fn build_draft_messages(diff: &str, hint: Option<&str>) -> Vec<ChatMessage> {
    let content = [Some(DRAFT_INSTRUCTIONS), hint, Some(diff)]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![ChatMessage::user(content)]
}

/// Parse the model's reply into a draft.
pub fn parse_draft(reply: &str) -> Result<CommitDraft, ReplyError> {
    let draft: CommitDraft = parse_json_reply(reply)?;
    if draft.title.trim().is_empty() {
        return Err(ReplyError::MissingField("title"));
    }
    Ok(draft)
}
