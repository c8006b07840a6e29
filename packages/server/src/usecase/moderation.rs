//! UseCase: moderation actions (pin message, timeout/ban/unban viewers).
//!
//! Moderation is the one path besides explicit leave and liveness
//! eviction that may close a connection: a banned or timed-out viewer is
//! removed from the audience and its socket is asked to close.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{CoordinatorError, ModerationAction, UserId};
use crate::infrastructure::dto::websocket::{ChatMessageDto, ServerEvent};
use crate::infrastructure::{Broadcaster, SessionStore};

use super::{parse_session_id, parse_user_id};

pub struct ModerationUseCase {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
}

impl ModerationUseCase {
    pub fn new(store: Arc<SessionStore>, broadcaster: Arc<Broadcaster>) -> Self {
        Self { store, broadcaster }
    }

    /// Flag a chat message as pinned and announce it session-wide.
    pub async fn pin_message(
        &self,
        session_id: &str,
        requester: &UserId,
        message_id: Uuid,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let (message, audience) = {
            let mut session = handle.lock().await;
            let message = ChatMessageDto::from(session.pin_message(requester, message_id)?);
            (message, session.audience_ids())
        };

        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::MessagePinned {
                    session_id: id.to_string(),
                    message,
                },
            )
            .await;
        Ok(())
    }

    /// Apply a moderation action to a viewer.
    pub async fn moderate_user(
        &self,
        session_id: &str,
        requester: &UserId,
        target_raw: &str,
        action: ModerationAction,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let target = parse_user_id(target_raw)?;
        let handle = self.store.require(&id).await?;

        let (evicted, audience) = {
            let mut session = handle.lock().await;
            let evicted = session.moderate(requester, &target, action)?;
            (evicted, session.audience_ids())
        };

        tracing::info!(
            "Moderation {:?} applied to '{}' in session {}",
            action,
            target,
            id
        );

        // Tell the target first; an eviction closes its connection right
        // after, which runs the normal disconnect cleanup.
        self.broadcaster
            .unicast(
                &target,
                &ServerEvent::Moderated {
                    session_id: id.to_string(),
                    action,
                },
            )
            .await;
        if evicted {
            self.broadcaster.close_connection(&target).await;
        }

        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::UserModerated {
                    session_id: id.to_string(),
                    user_id: target.to_string(),
                    action,
                },
            )
            .await;
        Ok(())
    }
}
