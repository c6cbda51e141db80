//! Message types exchanged with a model provider during one invocation.
//!
//! The adapter builds a short conversation per invocation:
//! user prompt → assistant (maybe tool calls) → tool results → assistant …

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::media::Media;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// One piece of message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    Media(Media),
}

/// A single message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,

    pub role: Role,

    #[serde(default)]
    pub parts: Vec<Part>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which call it answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// If this is a tool result, the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_parts(role: Role, parts: Vec<Part>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_parts(Role::User, vec![Part::Text { text: content.into() }])
    }

    /// A user message with mixed text and media.
    pub fn user_parts(parts: Vec<Part>) -> Self {
        Self::with_parts(Role::User, parts)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_parts(Role::Assistant, vec![Part::Text { text: content.into() }])
    }

    /// An assistant message that carries only tool calls.
    pub fn assistant_tool_calls(calls: Vec<MessageToolCall>) -> Self {
        let mut msg = Self::with_parts(Role::Assistant, Vec::new());
        msg.tool_calls = calls;
        msg
    }

    /// An assistant message that carries only media (e.g. generated audio).
    pub fn assistant_media(media: Media) -> Self {
        Self::with_parts(Role::Assistant, vec![Part::Media(media)])
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_parts(Role::System, vec![Part::Text { text: content.into() }])
    }

    /// A tool result message; `content` is the tool's validated JSON output.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: &Value,
    ) -> Self {
        let mut msg = Self::with_parts(
            Role::Tool,
            vec![Part::Text {
                text: content.to_string(),
            }],
        );
        msg.tool_call_id = Some(tool_call_id.into());
        msg.tool_name = Some(tool_name.into());
        msg
    }

    /// All text parts concatenated.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::Media(_) => None,
            })
            .collect()
    }

    /// The first media part, if any.
    pub fn media(&self) -> Option<&Media> {
        self.parts.iter().find_map(|p| match p {
            Part::Media(m) => Some(m),
            Part::Text { .. } => None,
        })
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    pub id: String,

    pub name: String,

    /// Arguments as a JSON value
    pub arguments: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_message_has_text() {
        let msg = Message::user("What's the weather?");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.text(), "What's the weather?");
        assert!(msg.media().is_none());
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn text_skips_media_parts() {
        let msg = Message::user_parts(vec![
            Part::Text { text: "Identify ".into() },
            Part::Media(Media::new("image/png", vec![1])),
            Part::Text { text: "this.".into() },
        ]);
        assert_eq!(msg.text(), "Identify this.");
        assert_eq!(msg.media().unwrap().mime_type, "image/png");
    }

    #[test]
    fn tool_result_records_call() {
        let msg = Message::tool_result("call_1", "getSystemStatus", &json!({"offlineNodes": 2}));
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.tool_name.as_deref(), Some("getSystemStatus"));
        assert_eq!(msg.text(), r#"{"offlineNodes":2}"#);
    }

    #[test]
    fn role_serialization() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn part_serialization_is_tagged() {
        let part = Part::Text { text: "hi".into() };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json, json!({"type": "text", "text": "hi"}));
    }
}
