//! Fan-out broadcaster.
//!
//! Delivers one outbound event to one of three audiences: a single
//! connection, the participants of a session, or the whole session
//! audience. Delivery is best-effort and non-blocking per recipient:
//! sends go through unbounded per-connection channels, a dead or absent
//! recipient is skipped, and a failed send never propagates to the
//! triggering request.

use std::sync::Arc;

use crate::domain::UserId;

use super::dto::websocket::ServerEvent;
use super::registry::{ConnectionRegistry, OutboundCommand};

pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver to one connection by identity.
    ///
    /// Silently no-ops if the user is not connected: the recipient being
    /// offline is not an error.
    pub async fn unicast(&self, target: &UserId, event: &ServerEvent) {
        let Some(sender) = self.registry.lookup(target).await else {
            tracing::debug!("Unicast to '{}' skipped; not connected", target);
            return;
        };
        if sender.send(OutboundCommand::Event(event.to_json())).is_err() {
            tracing::warn!("Failed to push event to '{}'; channel closed", target);
        }
    }

    /// Deliver to a list of identities (participants-only or session-wide
    /// audiences are resolved by the caller from session state).
    pub async fn fan_out(&self, targets: &[UserId], event: &ServerEvent) {
        let json = event.to_json();
        for target in targets {
            let Some(sender) = self.registry.lookup(target).await else {
                tracing::debug!("Fan-out to '{}' skipped; not connected", target);
                continue;
            };
            if sender
                .send(OutboundCommand::Event(json.clone()))
                .is_err()
            {
                tracing::warn!("Failed to push event to '{}'; channel closed", target);
            }
        }
    }

    /// Ask a connection to close (moderation eviction path).
    pub async fn close_connection(&self, target: &UserId) {
        if let Some(sender) = self.registry.lookup(target).await {
            let _ = sender.send(OutboundCommand::Close);
        }
    }
}
