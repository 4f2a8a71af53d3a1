//! WebSocket message envelope. Every frame is a JSON object with a `type`
//! discriminator.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::chat::RecordKind;

/// Which agent produced a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Chat,
    Record,
    Guest,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentType::Chat => write!(f, "chat"),
            AgentType::Record => write!(f, "record"),
            AgentType::Guest => write!(f, "guest"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_days() -> u32 {
    30
}

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ChatMessage {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        patient_id: Option<String>,
        #[serde(default = "default_true")]
        stream: bool,
        #[serde(default)]
        auto_route: bool,
    },
    RecordRequest {
        request_type: RecordKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        patient_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        vital_type: Option<String>,
        #[serde(default = "default_days")]
        days: u32,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum EnvelopeError {
    #[error("Malformed message: {0}")]
    Malformed(String),
    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

const CLIENT_TYPES: &[&str] = &["chat_message", "record_request"];

impl ClientMessage {
    pub fn chat(message: impl Into<String>) -> Self {
        ClientMessage::ChatMessage {
            message: message.into(),
            patient_id: None,
            stream: true,
            auto_route: false,
        }
    }

    /// Parse a text frame, telling an unknown `type` apart from a broken body.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| EnvelopeError::Malformed("missing \"type\" field".into()))?;
        if !CLIENT_TYPES.contains(&kind) {
            return Err(EnvelopeError::UnknownType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        session_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Typing {
        is_typing: bool,
        timestamp: DateTime<Utc>,
    },
    StreamStart {
        agent_type: AgentType,
        timestamp: DateTime<Utc>,
    },
    StreamChunk {
        chunk: String,
        timestamp: DateTime<Utc>,
    },
    StreamEnd {
        full_response: String,
        timestamp: DateTime<Utc>,
    },
    ChatResponse {
        response: String,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: String,
        code: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn connected(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Connected {
            session_id: session_id.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn typing(is_typing: bool) -> Self {
        ServerMessage::Typing {
            is_typing,
            timestamp: Utc::now(),
        }
    }

    pub fn stream_start(agent_type: AgentType) -> Self {
        ServerMessage::StreamStart {
            agent_type,
            timestamp: Utc::now(),
        }
    }

    pub fn stream_chunk(chunk: impl Into<String>) -> Self {
        ServerMessage::StreamChunk {
            chunk: chunk.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn stream_end(full_response: impl Into<String>) -> Self {
        ServerMessage::StreamEnd {
            full_response: full_response.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn chat_response(response: impl Into<String>) -> Self {
        ServerMessage::ChatResponse {
            response: response.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn error(error: impl Into<String>, code: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
            code: code.into(),
            timestamp: Utc::now(),
        }
    }

    /// The wire discriminator of this frame.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::Typing { .. } => "typing",
            ServerMessage::StreamStart { .. } => "stream_start",
            ServerMessage::StreamChunk { .. } => "stream_chunk",
            ServerMessage::StreamEnd { .. } => "stream_end",
            ServerMessage::ChatResponse { .. } => "chat_response",
            ServerMessage::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_defaults_to_streaming() {
        let parsed = ClientMessage::parse(r#"{"type": "chat_message", "message": "hello"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::chat("hello"));
    }

    #[test]
    fn record_request_parses_kind_and_window() {
        let parsed = ClientMessage::parse(
            r#"{"type": "record_request", "request_type": "vitals", "vital_type": "heart_rate", "days": 7}"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            ClientMessage::RecordRequest {
                request_type: RecordKind::Vitals,
                patient_id: None,
                vital_type: Some("heart_rate".into()),
                days: 7,
            }
        );
    }

    #[test]
    fn unknown_type_is_distinguished_from_malformed() {
        assert_eq!(
            ClientMessage::parse(r#"{"type": "subscribe"}"#),
            Err(EnvelopeError::UnknownType("subscribe".into()))
        );
        assert!(matches!(
            ClientMessage::parse("not json"),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::parse(r#"{"type": "chat_message"}"#),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn server_frames_carry_type_discriminator() {
        let frame = serde_json::to_value(ServerMessage::stream_chunk("Hel")).unwrap();
        assert_eq!(frame["type"], "stream_chunk");
        assert_eq!(frame["chunk"], "Hel");

        let frame = serde_json::to_value(ServerMessage::stream_start(AgentType::Record)).unwrap();
        assert_eq!(frame["type"], "stream_start");
        assert_eq!(frame["agent_type"], "record");
    }

    #[test]
    fn kind_matches_serialized_type() {
        for message in [
            ServerMessage::connected("s", "hi"),
            ServerMessage::typing(true),
            ServerMessage::stream_end("done"),
            ServerMessage::chat_response("ok"),
            ServerMessage::error("boom", "UPSTREAM_ERROR"),
        ] {
            let value = serde_json::to_value(&message).unwrap();
            assert_eq!(value["type"], message.kind());
        }
    }
}
