//! In-process session store.
//!
//! Each session owns its own [`ConversationMemory`] behind a mutex so that
//! queries on one session run one at a time while different sessions
//! proceed in parallel. Idle sessions expire; when the store is full the
//! least recently active session is evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::rag::{ConversationMemory, RagResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Turns kept per session
    pub memory_capacity: usize,
    /// Seconds of inactivity before a session is dropped
    pub idle_ttl_secs: u64,
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            memory_capacity: ConversationMemory::DEFAULT_CAPACITY,
            idle_ttl_secs: 3600,
            max_sessions: 1000,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub memory: ConversationMemory,
}

struct SessionEntry {
    session: Arc<Mutex<Session>>,
    last_active: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    config: SessionConfig,
    sessions: Arc<Mutex<HashMap<String, SessionEntry>>>,
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> RagResult<Self> {
        // Validate the capacity once up front.
        ConversationMemory::new(config.memory_capacity)?;
        Ok(Self {
            config,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.config.idle_ttl_secs)
    }

    /// Fetch the session for `session_id`, creating a fresh one if it is
    /// unknown or has expired.
    pub async fn get_or_create(&self, session_id: &str) -> RagResult<Arc<Mutex<Session>>> {
        let now = Instant::now();
        let ttl = self.idle_ttl();
        let mut sessions = self.sessions.lock().await;

        if let Some(entry) = sessions.get_mut(session_id) {
            if now.duration_since(entry.last_active) <= ttl {
                entry.last_active = now;
                return Ok(entry.session.clone());
            }
            tracing::debug!("Session {} expired", session_id);
            sessions.remove(session_id);
        }

        sessions.retain(|_, entry| now.duration_since(entry.last_active) <= ttl);
        if self.config.max_sessions > 0 && sessions.len() >= self.config.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_active)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                tracing::debug!("Session store full, evicting {}", id);
                sessions.remove(&id);
            }
        }

        let session = Arc::new(Mutex::new(Session {
            id: session_id.to_string(),
            memory: ConversationMemory::new(self.config.memory_capacity)?,
        }));
        sessions.insert(
            session_id.to_string(),
            SessionEntry {
                session: session.clone(),
                last_active: now,
            },
        );
        Ok(session)
    }

    /// The live session for `session_id`, without creating one.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<Session>>> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .filter(|entry| entry.last_active.elapsed() <= self.idle_ttl())
            .map(|entry| entry.session.clone())
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.lock().await.remove(session_id).is_some()
    }

    /// Drop every expired session, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let ttl = self.idle_ttl();
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_active.elapsed() <= ttl);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
