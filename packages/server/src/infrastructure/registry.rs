//! Connection registry: user identity to live connection binding.
//!
//! Process-scoped service object constructed at startup and injected into
//! the router, broadcaster and liveness monitor. At most one live
//! connection per user; binding again replaces the previous entry, which
//! ends the old connection's pusher loop.
//!
//! The registry holds only the delivery channel for each identity; it
//! never owns session membership.

use std::collections::HashMap;

use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use crate::domain::UserId;

/// Commands consumed by a connection's pusher loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCommand {
    /// Serialized server event to deliver as a text frame
    Event(String),
    /// Liveness probe, sent as a WebSocket ping frame
    Ping,
    /// Close the connection (explicit leave, moderation or eviction)
    Close,
}

pub type ConnectionSender = mpsc::UnboundedSender<OutboundCommand>;

struct Entry {
    connection_id: Uuid,
    sender: ConnectionSender,
    /// Cleared each liveness cycle; any inbound traffic re-confirms.
    confirmed: bool,
}

/// Process-wide map of authenticated user to live connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    entries: Mutex<HashMap<UserId, Entry>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an identity to a connection, replacing any previous binding.
    ///
    /// Returns the sender of the replaced connection, if any, so the
    /// caller can close the stale socket.
    pub async fn bind(
        &self,
        user_id: UserId,
        connection_id: Uuid,
        sender: ConnectionSender,
    ) -> Option<ConnectionSender> {
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(
            user_id.clone(),
            Entry {
                connection_id,
                sender,
                confirmed: true,
            },
        );
        tracing::debug!("Bound user '{}' to connection {}", user_id, connection_id);
        previous.map(|e| e.sender)
    }

    /// Look up the live delivery channel for a user, if connected.
    pub async fn lookup(&self, user_id: &UserId) -> Option<ConnectionSender> {
        let entries = self.entries.lock().await;
        entries.get(user_id).map(|e| e.sender.clone())
    }

    /// Remove a binding regardless of which connection holds it.
    /// Idempotent: unbinding an absent user is a no-op.
    pub async fn unbind(&self, user_id: &UserId) {
        let mut entries = self.entries.lock().await;
        if entries.remove(user_id).is_some() {
            tracing::debug!("Unbound user '{}'", user_id);
        }
    }

    /// Remove a binding only if it still belongs to the given connection.
    ///
    /// Cleanup for a closed socket must not tear down a newer binding
    /// created by a reconnect; returns whether the entry was removed.
    pub async fn unbind_connection(&self, user_id: &UserId, connection_id: Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(user_id) {
            Some(entry) if entry.connection_id == connection_id => {
                entries.remove(user_id);
                tracing::debug!("Unbound user '{}' (connection {})", user_id, connection_id);
                true
            }
            _ => false,
        }
    }

    /// Mark a user's connection as alive for the current liveness cycle.
    pub async fn confirm(&self, user_id: &UserId) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(user_id) {
            entry.confirmed = true;
        }
    }

    /// One liveness cycle: collect connections that stayed unconfirmed
    /// since the previous tick, then mark every surviving connection
    /// unconfirmed and send it a ping.
    pub async fn liveness_sweep(&self) -> Vec<(UserId, Uuid)> {
        let mut entries = self.entries.lock().await;
        let stale: Vec<(UserId, Uuid)> = entries
            .iter()
            .filter(|(_, e)| !e.confirmed)
            .map(|(user_id, e)| (user_id.clone(), e.connection_id))
            .collect();

        for (user_id, entry) in entries.iter_mut() {
            if entry.confirmed {
                entry.confirmed = false;
                if entry.sender.send(OutboundCommand::Ping).is_err() {
                    tracing::debug!("Ping to '{}' failed; channel closed", user_id);
                }
            }
        }
        stale
    }

    pub async fn connected_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}
