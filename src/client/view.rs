//! Chat UI state driven by server frames.

use crate::models::chat::{ChatMessage, Role};
use crate::models::envelope::{AgentType, ServerMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub message: String,
    pub code: String,
}

/// What a frame did to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    Welcome(String),
    Chunk(String),
    /// An assistant message was completed and added to the transcript.
    Completed(ChatMessage),
    Failed(ViewError),
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct ChatView {
    pub session_id: Option<String>,
    pub status: ConnectionStatus,
    pub messages: Vec<ChatMessage>,
    pub is_typing: bool,
    pub streaming: Option<String>,
    pub agent: Option<AgentType>,
    pub last_error: Option<ViewError>,
}

impl Default for ChatView {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ChatView {
    /// Start from a cached transcript.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            session_id: None,
            status: ConnectionStatus::Connecting,
            messages,
            is_typing: false,
            streaming: None,
            agent: None,
            last_error: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.is_typing || self.streaming.is_some()
    }

    /// Record a message typed by the user.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.last_error = None;
        self.messages.push(ChatMessage::user(text));
    }

    /// Drop the trailing user message if nothing answered it. The server
    /// keeps no trace of a failed exchange, so neither does the transcript.
    pub fn discard_unanswered(&mut self) -> Option<ChatMessage> {
        match self.messages.last() {
            Some(last) if last.role == Role::User => self.messages.pop(),
            _ => None,
        }
    }

    pub fn set_status(&mut self, status: ConnectionStatus) {
        if status == ConnectionStatus::Disconnected {
            self.is_typing = false;
            self.streaming = None;
        }
        self.status = status;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.streaming = None;
        self.last_error = None;
    }

    pub fn apply(&mut self, frame: ServerMessage) -> ViewEvent {
        match frame {
            ServerMessage::Connected {
                session_id,
                message,
                ..
            } => {
                self.session_id = Some(session_id);
                self.status = ConnectionStatus::Connected;
                ViewEvent::Welcome(message)
            }
            ServerMessage::Typing { is_typing, .. } => {
                self.is_typing = is_typing;
                ViewEvent::Unchanged
            }
            ServerMessage::StreamStart { agent_type, .. } => {
                self.agent = Some(agent_type);
                self.streaming = Some(String::new());
                ViewEvent::Unchanged
            }
            ServerMessage::StreamChunk { chunk, .. } => {
                self.streaming.get_or_insert_with(String::new).push_str(&chunk);
                ViewEvent::Chunk(chunk)
            }
            ServerMessage::StreamEnd { full_response, .. } => {
                self.streaming = None;
                self.complete(full_response)
            }
            ServerMessage::ChatResponse { response, .. } => self.complete(response),
            ServerMessage::Error { error, code, .. } => {
                self.streaming = None;
                self.discard_unanswered();
                let error = ViewError {
                    message: error,
                    code,
                };
                self.last_error = Some(error.clone());
                ViewEvent::Failed(error)
            }
        }
    }

    fn complete(&mut self, text: String) -> ViewEvent {
        let message = ChatMessage::assistant(text);
        self.messages.push(message.clone());
        ViewEvent::Completed(message)
    }
}
