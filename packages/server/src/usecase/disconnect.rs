//! UseCase: connection teardown.
//!
//! Runs when a socket closes for any reason (client close, transport
//! error, liveness eviction). Viewers are removed from every session
//! outright; participants keep their membership and are only marked
//! disconnected, so a co-star can rejoin after a network blip.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::UserId;
use crate::infrastructure::dto::websocket::ServerEvent;
use crate::infrastructure::{Broadcaster, ConnectionRegistry, SessionStore};

pub struct DisconnectUseCase {
    store: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
    broadcaster: Arc<Broadcaster>,
}

impl DisconnectUseCase {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<ConnectionRegistry>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            store,
            registry,
            broadcaster,
        }
    }

    /// Clean up after a closed connection.
    ///
    /// The connection id pins every step: a user that already reconnected
    /// holds newer bindings and session entries, and those must survive
    /// the late cleanup of the old socket.
    pub async fn execute(&self, user_id: &UserId, connection_id: Uuid) {
        let unbound = self.registry.unbind_connection(user_id, connection_id).await;
        tracing::info!(
            "Connection {} of '{}' closed (binding removed: {})",
            connection_id,
            user_id,
            unbound
        );

        for handle in self.store.all().await {
            let (left_session, audience) = {
                let mut session = handle.lock().await;
                match session.viewers.get(user_id) {
                    Some(viewer) if viewer.connection == connection_id => {
                        session.remove_viewer(user_id);
                        (Some(session.id), session.audience_ids())
                    }
                    Some(_) => (None, Vec::new()),
                    None => {
                        let ours = session
                            .participants
                            .get(user_id)
                            .is_some_and(|p| p.connection == Some(connection_id));
                        if ours {
                            session.participant_disconnected(user_id);
                        }
                        (None, Vec::new())
                    }
                }
            };

            if let Some(session_id) = left_session {
                self.broadcaster
                    .fan_out(
                        &audience,
                        &ServerEvent::LeftStream {
                            session_id: session_id.to_string(),
                            user_id: user_id.to_string(),
                        },
                    )
                    .await;
            }
        }
    }
}
