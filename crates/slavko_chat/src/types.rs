//! Chat message types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// Presentation marker on a model message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// The reply is still streaming in.
    Thinking,
    /// The message body is an error indicator, not model output.
    Error,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Unique message ID (UUID).
    pub id: String,
    /// Role of the message sender.
    pub role: ChatRole,
    /// Message content.
    pub content: String,
    /// Presentation marker, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    /// When the message was created.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: format!("user-{}", uuid::Uuid::new_v4()),
            role: ChatRole::User,
            content: content.into(),
            kind: None,
            created_at: Utc::now(),
        }
    }

    /// Create a new model message.
    pub fn model(content: impl Into<String>) -> Self {
        Self {
            id: format!("model-{}", uuid::Uuid::new_v4()),
            role: ChatRole::Model,
            content: content.into(),
            kind: None,
            created_at: Utc::now(),
        }
    }

    /// Create the placeholder shown while a reply streams in.
    pub fn thinking() -> Self {
        let mut message = Self::model("");
        message.kind = Some(MessageKind::Thinking);
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = ChatMessage::user("Hello");
        assert_eq!(msg.role, ChatRole::User);
        assert_eq!(msg.content, "Hello");
        assert_eq!(msg.kind, None);

        let msg = ChatMessage::thinking();
        assert_eq!(msg.role, ChatRole::Model);
        assert_eq!(msg.kind, Some(MessageKind::Thinking));
        assert!(msg.content.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ChatMessage::user("a").id, ChatMessage::user("a").id);
    }
}
