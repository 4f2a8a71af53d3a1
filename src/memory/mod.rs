//! Per-session conversational memory.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{MemoryBackend, MemoryConfig};
use crate::models::chat::{ChatMessage, SessionContext};

pub mod local;
pub mod redis;

pub use self::local::InMemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Redis error: {0}")]
    Redis(#[from] bb8_redis::redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(String),

    #[error("Stored session data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Storage for session histories and contexts.
///
/// Every write refreshes the session's expiry. `commit` stores its whole
/// batch, and the context when one is given, or nothing.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The most recent `limit` messages, oldest first.
    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>, MemoryError>;

    /// Append `messages` and replace the context in one write.
    async fn commit(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
        context: Option<&SessionContext>,
    ) -> Result<(), MemoryError>;

    async fn append(&self, session_id: &str, messages: &[ChatMessage]) -> Result<(), MemoryError> {
        self.commit(session_id, messages, None).await
    }

    async fn context(&self, session_id: &str) -> Result<SessionContext, MemoryError>;

    async fn save_context(&self, session_id: &str, context: &SessionContext) -> Result<(), MemoryError>;

    /// Drop history and context for the session.
    async fn clear(&self, session_id: &str) -> Result<(), MemoryError>;
}

/// Build the store selected by configuration.
pub async fn build_store(config: &MemoryConfig) -> Result<Arc<dyn MemoryStore>, MemoryError> {
    let ttl = Duration::from_secs(config.ttl_secs);
    match config.backend {
        MemoryBackend::Memory => Ok(Arc::new(InMemoryStore::new(ttl))),
        MemoryBackend::Redis => {
            let store = RedisStore::connect(&config.redis_url, config.pool_size, ttl).await?;
            Ok(Arc::new(store))
        }
    }
}
