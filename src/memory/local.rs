use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::{MemoryError, MemoryStore};
use crate::models::chat::{ChatMessage, SessionContext};

#[derive(Debug, Clone)]
struct SessionEntry {
    history: Vec<ChatMessage>,
    context: SessionContext,
    expires_at: Instant,
}

/// Writes between two sweeps of expired sessions.
const SWEEP_EVERY: usize = 256;

/// Process-local store. Expired sessions are dropped on access and swept
/// from the map every `SWEEP_EVERY` writes.
pub struct InMemoryStore {
    sessions: DashMap<String, SessionEntry>,
    ttl: Duration,
    writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
            writes: AtomicUsize::new(0),
        }
    }

    /// Remove every expired session. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, "swept expired sessions");
        }
        removed
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.sessions.iter().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live(&self, session_id: &str) -> Option<SessionEntry> {
        let now = Instant::now();
        let entry = self.sessions.get(session_id)?.clone();
        if entry.expires_at <= now {
            self.sessions.remove(session_id);
            return None;
        }
        Some(entry)
    }

    fn write<F>(&self, session_id: &str, update: F)
    where
        F: FnOnce(&mut SessionEntry),
    {
        let now = Instant::now();
        {
            let mut entry = self
                .sessions
                .entry(session_id.to_string())
                .or_insert_with(|| SessionEntry {
                    history: Vec::new(),
                    context: SessionContext::default(),
                    expires_at: now + self.ttl,
                });
            if entry.expires_at <= now {
                entry.history.clear();
                entry.context = SessionContext::default();
            }
            update(&mut entry);
            entry.expires_at = now + self.ttl;
        }
        // The entry guard holds a shard lock; sweep only after it is released.
        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.purge_expired();
        }
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn history(&self, session_id: &str, limit: usize) -> Result<Vec<ChatMessage>, MemoryError> {
        Ok(self
            .live(session_id)
            .map(|entry| {
                let skip = entry.history.len().saturating_sub(limit);
                entry.history[skip..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn commit(
        &self,
        session_id: &str,
        messages: &[ChatMessage],
        context: Option<&SessionContext>,
    ) -> Result<(), MemoryError> {
        self.write(session_id, |entry| {
            entry.history.extend_from_slice(messages);
            if let Some(context) = context {
                entry.context = context.clone();
            }
        });
        Ok(())
    }

    async fn context(&self, session_id: &str) -> Result<SessionContext, MemoryError> {
        Ok(self
            .live(session_id)
            .map(|entry| entry.context)
            .unwrap_or_default())
    }

    async fn save_context(&self, session_id: &str, context: &SessionContext) -> Result<(), MemoryError> {
        self.write(session_id, |entry| entry.context = context.clone());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), MemoryError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}
