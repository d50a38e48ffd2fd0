//! JSON extraction from free-form replies.
//!
//! Models asked for strict JSON still wrap it in markdown fences or add a
//! sentence around it, and sometimes answer with single-quoted pseudo-JSON
//! copied from the example in the prompt.

use serde::de::DeserializeOwned;

use crate::error::ReplyError;

/// Find the JSON object inside a reply.
///
/// Tries, in order: the whole reply, a ` ```json ` fence, a bare fence whose
/// body starts with `{`, and the first balanced `{...}` run. Returns `None`
/// when nothing looks like JSON.
pub fn extract_json(reply: &str) -> Option<&str> {
    let trimmed = reply.trim();

    if trimmed.starts_with('{') && is_json(trimmed) {
        return Some(trimmed);
    }

    if let Some(body) = fenced(trimmed, "```json") {
        return Some(body);
    }

    if let Some(body) = fenced(trimmed, "```")
        && body.starts_with('{')
    {
        return Some(body);
    }

    trimmed
        .match_indices('{')
        .filter_map(|(idx, _)| balanced_object(&trimmed[idx..]))
        .find(|candidate| is_json(candidate))
}

/// Parse a reply into `T`, tolerating fences and surrounding prose.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T, ReplyError> {
    if let Some(candidate) = extract_json(reply) {
        return decode(candidate, reply);
    }

    // Example-style single quotes: {'title': '...'}
    let requoted = reply.replace('\'', "\"");
    if let Some(candidate) = extract_json(&requoted) {
        return decode(candidate, reply);
    }

    Err(ReplyError::InvalidJson(format!(
        "no JSON object in reply: {}",
        preview(reply)
    )))
}

fn decode<T: DeserializeOwned>(candidate: &str, reply: &str) -> Result<T, ReplyError> {
    serde_json::from_str(candidate)
        .map_err(|e| ReplyError::InvalidJson(format!("{}: {}", e, preview(reply))))
}

fn is_json(text: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(text).is_ok()
}

fn fenced<'r>(text: &'r str, opening: &str) -> Option<&'r str> {
    let start = text.find(opening)? + opening.len();
    let end = text[start..].find("```")?;
    Some(text[start..start + end].trim())
}

/// The shortest prefix of `text` with balanced braces, ignoring braces
/// inside string literals.
fn balanced_object(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }

    None
}

fn preview(reply: &str) -> String {
    reply.chars().take(200).collect()
}
