use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// Who authored a message in a thread
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Label used when a thread is flattened into a title prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

// Represents a single message in a conversation thread
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub id: String, // Unique within its conversation, stable across reloads
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Creates a message with a freshly generated id.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role.as_str().to_string(),
            content: self.content.clone(),
        }
    }
}

// Represents the metadata for a conversation thread
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            // v7 ids sort by creation time and stay unique within one millisecond
            id: Uuid::now_v7().to_string(),
            title: title.into(),
            // Stored as epoch millis, so keep reloads exact
            created_at: Utc::now().trunc_subsecs(3),
        }
    }
}

/// A message as it travels over the wire to the proxy and the backend.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// The models the proxy is willing to forward to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Model {
    #[default]
    #[serde(rename = "grok-4-fast")]
    Grok4Fast,
    #[serde(rename = "secondmind-agent-v1")]
    SecondmindAgentV1,
}

impl Model {
    pub const ALL: [Model; 2] = [Model::Grok4Fast, Model::SecondmindAgentV1];

    pub fn id(&self) -> &'static str {
        match self {
            Model::Grok4Fast => "grok-4-fast",
            Model::SecondmindAgentV1 => "secondmind-agent-v1",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Model::Grok4Fast => "Grok 4 Fast",
            Model::SecondmindAgentV1 => "SecondMind Agent",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Model::Grok4Fast => "Fast and efficient",
            Model::SecondmindAgentV1 => "Multi-tool agent with web search",
        }
    }

    /// Looks up a model by its wire identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }

    /// Resolves a requested identifier, falling back to the default for
    /// anything unknown or absent.
    pub fn resolve(requested: Option<&str>) -> Self {
        requested.and_then(Self::from_id).unwrap_or_default()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub fn new_message_id() -> String {
    format!("msg-{}", Uuid::now_v7().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_resolve_falls_back_to_default() {
        assert_eq!(Model::resolve(Some("secondmind-agent-v1")), Model::SecondmindAgentV1);
        assert_eq!(Model::resolve(Some("not-a-model")), Model::Grok4Fast);
        assert_eq!(Model::resolve(None), Model::Grok4Fast);
    }

    #[test]
    fn test_model_serializes_as_wire_id() {
        let json = serde_json::to_string(&Model::SecondmindAgentV1).unwrap();
        assert_eq!(json, "\"secondmind-agent-v1\"");
    }

    #[test]
    fn test_conversation_uses_camel_case_millis() {
        let conversation = Conversation::new("New Chat");
        let value = serde_json::to_value(&conversation).unwrap();
        assert_eq!(
            value["createdAt"].as_i64(),
            Some(conversation.created_at.timestamp_millis())
        );
        assert_eq!(value["title"], "New Chat");
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("one");
        let b = Message::user("two");
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("msg-"));
        assert_eq!(a.to_chat_message(), ChatMessage::new("user", "one"));
    }
}
