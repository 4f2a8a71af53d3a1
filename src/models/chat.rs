//! Conversation types and the REST chat/record payloads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const MAX_MESSAGE_CHARS: u64 = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// Per-session facts remembered alongside the history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(custom = "validate_message")]
    pub message: String,
    #[validate(length(min = 1, max = 64))]
    pub patient_id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GuestChatRequest {
    #[validate(custom = "validate_message")]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestChatResponse {
    pub message: String,
    pub session_id: String,
}

/// Record categories the record agent can answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Summary,
    Vitals,
    Prescriptions,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Summary => write!(f, "summary"),
            RecordKind::Vitals => write!(f, "vitals"),
            RecordKind::Prescriptions => write!(f, "prescriptions"),
        }
    }
}

fn default_days() -> u32 {
    30
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RecordRequest {
    #[validate(length(min = 1, max = 64))]
    pub patient_id: String,
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub vital_type: Option<String>,
    #[serde(default = "default_days")]
    #[validate(range(min = 1, max = 365))]
    pub days: u32,
}

pub(crate) fn validate_message(message: &str) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::new("empty_message"));
    }
    if message.chars().count() as u64 > MAX_MESSAGE_CHARS {
        return Err(ValidationError::new("message_too_long"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_without_timestamp_when_absent() {
        let json = serde_json::to_value(ChatMessage::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn blank_and_oversized_messages_are_rejected() {
        assert!(validate_message("   ").is_err());
        assert!(validate_message(&"a".repeat(MAX_MESSAGE_CHARS as usize + 1)).is_err());
        assert!(validate_message("How are my vitals?").is_ok());
    }

    #[test]
    fn record_request_defaults_to_thirty_days() {
        let request: RecordRequest =
            serde_json::from_str(r#"{"patient_id": "p-1"}"#).unwrap();
        assert_eq!(request.days, 30);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn record_request_rejects_out_of_range_window() {
        let request: RecordRequest =
            serde_json::from_str(r#"{"patient_id": "p-1", "days": 0}"#).unwrap();
        assert!(request.validate().is_err());
    }
}
