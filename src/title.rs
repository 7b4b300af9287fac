use crate::models::Message;

/// Title for a conversation that has no generated title.
pub const DEFAULT_TITLE: &str = "New Chat";
/// Title shown while a title request is outstanding.
pub const PENDING_TITLE: &str = "Generating title...";

const MAX_CONTEXT_MESSAGES: usize = 10;
const MAX_CONTEXT_CHARS: usize = 100;
const MAX_TITLE_CHARS: usize = 30;
const ELLIPSIS: &str = "...";

/// Builds the prompt that asks the backend to summarize a thread.
pub fn build_title_prompt(messages: &[Message]) -> String {
    let summary = messages
        .iter()
        .take(MAX_CONTEXT_MESSAGES)
        .map(|m| {
            let clipped: String = m.content.chars().take(MAX_CONTEXT_CHARS).collect();
            format!("{}: {}", m.role.label(), clipped)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Write a short title for the following conversation (at most {} characters, \
         no quotes or special symbols). The title should capture the main topic of the \
         whole conversation:\n\n{}",
        MAX_TITLE_CHARS, summary
    )
}

/// Turns a raw backend reply into a stored title.
///
/// One leading and one trailing quote character are stripped, and anything
/// longer than the limit is cut and marked with an ellipsis. An empty result
/// yields [`DEFAULT_TITLE`].
pub fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed.strip_prefix(['"', '\'']).unwrap_or(trimmed);
    let unquoted = unquoted.strip_suffix(['"', '\'']).unwrap_or(unquoted);
    let title = unquoted.trim();

    if title.is_empty() {
        return DEFAULT_TITLE.to_string();
    }

    if title.chars().count() > MAX_TITLE_CHARS {
        let mut clipped: String = title.chars().take(MAX_TITLE_CHARS).collect();
        clipped.push_str(ELLIPSIS);
        clipped
    } else {
        title.to_string()
    }
}
