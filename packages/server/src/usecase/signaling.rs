//! UseCase: point-to-point signaling relay.
//!
//! Offer, answer and candidate payloads are forwarded verbatim between
//! two participants of the same session. The coordinator confirms both
//! parties are current participants and otherwise never looks inside the
//! payload; a disconnected target follows the unicast no-op rule.

use std::sync::Arc;

use crate::domain::{CoordinatorError, UserId};
use crate::infrastructure::dto::websocket::ServerEvent;
use crate::infrastructure::{Broadcaster, SessionStore};

use super::{parse_session_id, parse_user_id};

/// The three payload kinds the relay forwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

pub struct SignalingUseCase {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
}

impl SignalingUseCase {
    pub fn new(store: Arc<SessionStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Forward a signaling payload from `sender` to `target_raw`.
    pub async fn relay(
        &self,
        kind: SignalKind,
        session_id: &str,
        sender: &UserId,
        target_raw: &str,
        payload: serde_json::Value,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let target = parse_user_id(target_raw)?;
        let handle = self.store.require(&id).await?;

        {
            let session = handle.lock().await;
            if !session.is_participant(sender) {
                return Err(CoordinatorError::NotAParticipant);
            }
            if !session.is_participant(&target) {
                return Err(CoordinatorError::NotAParticipant);
            }
        }

        let session_id = id.to_string();
        let from_id = sender.to_string();
        let event = match kind {
            SignalKind::Offer => ServerEvent::SignalOffer {
                session_id,
                from_id,
                payload,
            },
            SignalKind::Answer => ServerEvent::SignalAnswer {
                session_id,
                from_id,
                payload,
            },
            SignalKind::Candidate => ServerEvent::SignalCandidate {
                session_id,
                from_id,
                payload,
            },
        };

        // Disconnected target: silently dropped, same as any unicast.
        self.broadcaster.unicast(&target, &event).await;
        Ok(())
    }
}
