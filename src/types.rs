// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Core type definitions shared across the crate.
//!
//! These mirror the host's session RPC shapes: sessions with optional parent
//! links, messages split into metadata (`MessageInfo`) and content parts, and
//! the agent identities exposed for delegation.

use serde::{Deserialize, Serialize};

/// Information about an available agent identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Unique agent name/identifier.
    pub name: String,
    /// Human-readable description of the agent's capabilities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AgentInfo {
    /// Create an agent info with a description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
        }
    }

    /// Create an agent info without a description.
    pub fn unnamed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// A host session representing a conversation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session identifier.
    pub id: String,
    /// Human-readable session title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Parent session ID for nested sessions.
    #[serde(rename = "parentID", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// A message content part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text content.
    Text { text: String },
    /// File reference content.
    File { path: String },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Get the text content, if this is a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// Error attached to a message that was aborted or failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageError {
    /// Error name/type.
    pub name: String,
    /// Error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Message metadata in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageInfo {
    /// Unique message identifier.
    pub id: String,
    /// Message author role.
    pub role: Role,
    /// Session this message belongs to.
    #[serde(rename = "sessionID")]
    pub session_id: String,
    /// Error information if the message was aborted or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MessageError>,
}

/// A message with its metadata and content parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageItem {
    /// Message metadata.
    pub info: MessageInfo,
    /// Content parts of the message.
    pub parts: Vec<Part>,
}

impl MessageItem {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_text() {
        let part = Part::text("hello");
        assert_eq!(part.as_text(), Some("hello"));

        let file = Part::File {
            path: "/tmp/x".to_string(),
        };
        assert_eq!(file.as_text(), None);
    }

    #[test]
    fn test_session_parent_id_wire_name() {
        let session = Session {
            id: "ses-1".to_string(),
            title: Some("Delegation: issue-1".to_string()),
            parent_id: Some("ses-0".to_string()),
        };

        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"parentID\":\"ses-0\""));

        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.parent_id.as_deref(), Some("ses-0"));
    }

    #[test]
    fn test_message_item_text() {
        let item = MessageItem {
            info: MessageInfo {
                id: "msg-1".to_string(),
                role: Role::Assistant,
                session_id: "ses-1".to_string(),
                error: None,
            },
            parts: vec![Part::text("one"), Part::text("two")],
        };
        assert_eq!(item.text(), "one\ntwo");
    }

    #[test]
    fn test_part_serde_tag() {
        let json = serde_json::to_string(&Part::text("hi")).unwrap();
        assert!(json.contains("\"type\":\"text\""));
    }
}
