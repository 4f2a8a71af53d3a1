//! Guest session identity and the locally cached transcript.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use tracing::warn;

use super::storage::{SessionStorage, StorageError};
use crate::models::chat::ChatMessage;

pub const SESSION_KEY: &str = "careagent_session_id";
pub const HISTORY_KEY: &str = "careagent_chat_history";

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `guest_<unix millis>_<9 random base36 chars>`
pub fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("guest_{}_{}", millis, suffix)
}

/// Session manager over a key/value storage.
pub struct SessionManager<S> {
    storage: S,
}

impl<S: SessionStorage> SessionManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn has_session(&self) -> bool {
        self.storage.get(SESSION_KEY).is_some()
    }

    /// The stored identifier, generating and persisting one on first use.
    pub fn session_id(&mut self) -> Result<String, StorageError> {
        if let Some(id) = self.storage.get(SESSION_KEY) {
            return Ok(id);
        }
        let id = generate_session_id();
        self.storage.set(SESSION_KEY, &id)?;
        Ok(id)
    }

    /// Forget the transcript and switch to a fresh identifier.
    pub fn clear_session(&mut self) -> Result<String, StorageError> {
        let previous = self.storage.get(SESSION_KEY);
        self.storage.remove(HISTORY_KEY)?;

        let mut id = generate_session_id();
        while previous.as_deref() == Some(id.as_str()) {
            id = generate_session_id();
        }
        self.storage.set(SESSION_KEY, &id)?;
        Ok(id)
    }

    pub fn save_history(&mut self, messages: &[ChatMessage]) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(messages)?;
        self.storage.set(HISTORY_KEY, &encoded)
    }

    /// The cached transcript. Missing or unreadable data reads as empty.
    pub fn history(&self) -> Vec<ChatMessage> {
        let Some(raw) = self.storage.get(HISTORY_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "discarding corrupt chat history");
            Vec::new()
        })
    }
}
