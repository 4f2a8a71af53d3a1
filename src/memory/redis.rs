use std::time::Duration;

use async_trait::async_trait;
use bb8_redis::bb8::{Pool, PooledConnection};
use bb8_redis::redis;
use bb8_redis::RedisConnectionManager;
use tracing::{debug, instrument, warn};

use super::{MemoryError, MemoryStore};
use crate::models::chat::{ChatMessage, SessionContext};

fn history_key(session_id: &str) -> String {
    format!("chat:session:{}", session_id)
}

fn context_key(session_id: &str) -> String {
    format!("chat:context:{}", session_id)
}

/// Shared store backed by Redis lists (history) and strings (context).
pub struct RedisStore {
    pool: Pool<RedisConnectionManager>,
    ttl: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str, pool_size: u32, ttl: Duration) -> Result<Self, MemoryError> {
        let manager = RedisConnectionManager::new(url)?;
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .await?;
        debug!(pool_size, "redis pool ready");
        Ok(Self { pool, ttl })
    }

    async fn conn(&self) -> Result<PooledConnection<'_, RedisConnectionManager>, MemoryError> {
        self.pool
            .get()
            .await
            .map_err(|e| MemoryError::Pool(e.to_string()))
    }
}

#[async_trait]
impl MemoryStore for RedisStore {
    #[instrument(skip(self))]
    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>, MemoryError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let raw: Vec<String> = redis::cmd("LRANGE")
            .arg(history_key(session_id))
            .arg(-(limit as isize))
            .arg(-1)
            .query_async(&mut *conn)
            .await?;

        let mut messages = Vec::with_capacity(raw.len());
        for item in raw {
            match serde_json::from_str(&item) {
                Ok(message) => messages.push(message),
                Err(e) => warn!(error = %e, "skipping undecodable history entry"),
            }
        }
        Ok(messages)
    }

    #[instrument(skip(self, messages, context), fields(count = messages.len()))]
    async fn commit(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
        context: Option<&SessionContext>,
    ) -> Result<(), MemoryError> {
        if messages.is_empty() && context.is_none() {
            return Ok(());
        }
        let encoded = messages
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        let context = context.map(serde_json::to_string).transpose()?;

        let key = history_key(session_id);
        let ttl = self.ttl.as_secs();
        let mut pipe = redis::pipe();
        pipe.atomic();
        if !encoded.is_empty() {
            pipe.cmd("RPUSH").arg(&key).arg(encoded).ignore();
        }
        pipe.cmd("EXPIRE").arg(&key).arg(ttl).ignore();
        match context {
            Some(context) => pipe
                .cmd("SETEX")
                .arg(context_key(session_id))
                .arg(ttl)
                .arg(context)
                .ignore(),
            None => pipe.cmd("EXPIRE").arg(context_key(session_id)).arg(ttl).ignore(),
        };

        let mut conn = self.conn().await?;
        pipe.query_async::<_, ()>(&mut *conn).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn context(&self, session_id: &str) -> Result<SessionContext, MemoryError> {
        let mut conn = self.conn().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(context_key(session_id))
            .query_async(&mut *conn)
            .await?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(SessionContext::default()),
        }
    }

    #[instrument(skip(self, context))]
    async fn save_context(&self, session_id: &str, context: &SessionContext) -> Result<(), MemoryError> {
        let encoded = serde_json::to_string(context)?;
        let mut conn = self.conn().await?;
        redis::pipe()
            .atomic()
            .cmd("SETEX")
            .arg(context_key(session_id))
            .arg(self.ttl.as_secs())
            .arg(encoded)
            .ignore()
            .cmd("EXPIRE")
            .arg(history_key(session_id))
            .arg(self.ttl.as_secs())
            .ignore()
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear(&self, session_id: &str) -> Result<(), MemoryError> {
        let mut conn = self.conn().await?;
        redis::cmd("DEL")
            .arg(history_key(session_id))
            .arg(context_key(session_id))
            .query_async::<_, ()>(&mut *conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_per_session() {
        assert_eq!(history_key("abc"), "chat:session:abc");
        assert_eq!(context_key("abc"), "chat:context:abc");
    }
}
