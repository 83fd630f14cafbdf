use chrono::Utc;
use serde::{ Serialize, Deserialize };
use std::fmt;

use crate::identity::ConversationId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
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

    pub fn label(&self) -> &'static str {
        match self {
            Role::System => "System",
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message as exchanged with the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Option<ConversationId>,
    pub messages: Vec<Message>,
}

/// One line of the rendered transcript. Content is plain text and is never
/// interpreted as markup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl ChatEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

impl From<Message> for ChatEntry {
    fn from(message: Message) -> Self {
        ChatEntry::new(message.role, message.content)
    }
}

impl PartialEq<Message> for ChatEntry {
    fn eq(&self, other: &Message) -> bool {
        self.role == other.role && self.content == other.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_keeps_role_and_content() {
        let entry = ChatEntry::from(Message::assistant("<b>hi</b>"));
        assert_eq!(entry.role, Role::Assistant);
        assert_eq!(entry.content, "<b>hi</b>");
        assert!(!entry.is_user());
        assert_eq!(entry, Message::assistant("<b>hi</b>"));
    }

    #[test]
    fn role_serializes_camel_case() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
        assert_eq!(Role::User.label(), "User");
    }
}
