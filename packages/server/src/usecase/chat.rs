//! UseCase: chat and gift messages.
//!
//! Messages are accepted under the session lock, which fixes their
//! delivery order: all current recipients see a session's chat in the
//! order the router accepted it.

use std::sync::Arc;

use costream_shared::time::Clock;
use uuid::Uuid;

use crate::domain::{ChatMessageKind, CoordinatorError, MessageBody, Timestamp, UserId};
use crate::infrastructure::dto::websocket::{ChatMessageDto, ServerEvent};
use crate::infrastructure::{Broadcaster, SessionStore};

use super::parse_session_id;

pub struct ChatUseCase {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
}

impl ChatUseCase {
    pub fn new(
        store: Arc<SessionStore>,
        broadcaster: Arc<Broadcaster>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            clock,
        }
    }

    /// Append a text message and fan it out session-wide.
    pub async fn send_chat(
        &self,
        session_id: &str,
        sender: &UserId,
        body: String,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let body = MessageBody::try_from(body)?;
        let handle = self.store.require(&id).await?;

        let (message, audience) = {
            let mut session = handle.lock().await;
            let now = Timestamp::new(self.clock.now_utc_millis());
            let message = session.add_chat(
                sender.clone(),
                body,
                ChatMessageKind::Text,
                Uuid::new_v4(),
                now,
            )?;
            (ChatMessageDto::from(&message), session.audience_ids())
        };

        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::ChatMessage {
                    session_id: id.to_string(),
                    message,
                },
            )
            .await;
        Ok(())
    }

    /// Record a gift: a gift-announcement chat entry plus the gift
    /// counters, fanned out session-wide.
    pub async fn send_gift(
        &self,
        session_id: &str,
        sender: &UserId,
        gift_id: String,
        value: u64,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let body = MessageBody::new(format!("{} sent a gift: {}", sender, gift_id))?;
        let handle = self.store.require(&id).await?;

        let (message, audience) = {
            let mut session = handle.lock().await;
            let now = Timestamp::new(self.clock.now_utc_millis());
            let message = session.add_chat(
                sender.clone(),
                body,
                ChatMessageKind::Gift,
                Uuid::new_v4(),
                now,
            )?;
            session.record_gift_value(value);
            (ChatMessageDto::from(&message), session.audience_ids())
        };

        tracing::debug!("Gift '{}' ({}) in session {}", gift_id, value, id);
        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::GiftSent {
                    session_id: id.to_string(),
                    sender_id: sender.to_string(),
                    gift_id,
                    value,
                    message,
                },
            )
            .await;
        Ok(())
    }
}
