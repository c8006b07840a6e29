//! In-memory session store.
//!
//! Exclusive owner of all `Session` state. Each session sits behind its
//! own `Mutex`, so mutations to one session are serialized while
//! operations on different sessions proceed independently. The outer
//! `RwLock` only guards the table itself.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::domain::{CoordinatorError, Session, SessionId};

pub type SessionHandle = Arc<Mutex<Session>>;

/// Table of active sessions keyed by session id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created session and return its handle.
    pub async fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, handle.clone());
        tracing::debug!("Session {} registered ({} active)", id, sessions.len());
        handle
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    /// Like `get`, but a missing session is a `StreamNotFound` error.
    pub async fn require(&self, id: &SessionId) -> Result<SessionHandle, CoordinatorError> {
        self.get(id)
            .await
            .ok_or_else(|| CoordinatorError::StreamNotFound(id.to_string()))
    }

    pub async fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    /// Handles of every active session, for cross-session scans
    /// (disconnect cleanup, HTTP listings).
    pub async fn all(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
