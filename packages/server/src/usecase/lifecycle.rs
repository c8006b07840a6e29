//! UseCase: session lifecycle (create, start, end).
//!
//! The state machine itself lives on the `Session` entity; this layer
//! adds locking, timestamps and fan-out. Only the host may trigger
//! transitions, enforced by the entity.

use std::sync::Arc;

use costream_shared::time::Clock;
use uuid::Uuid;

use crate::domain::{CoordinatorError, Session, SessionId, Timestamp, UserId};
use crate::infrastructure::dto::websocket::{ServerEvent, SessionSnapshot};
use crate::infrastructure::{Broadcaster, SessionStore};

use super::parse_session_id;

pub struct LifecycleUseCase {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
}

impl LifecycleUseCase {
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

    /// Allocate a new session in `created`, with the caller as host.
    pub async fn create_stream(
        &self,
        host_id: UserId,
        connection_id: Uuid,
        title: String,
        settings: Option<serde_json::Value>,
    ) -> Result<SessionSnapshot, CoordinatorError> {
        let now = Timestamp::new(self.clock.now_utc_millis());
        let mut session = Session::new(
            SessionId::generate(),
            host_id.clone(),
            title,
            connection_id,
            now,
        )?;
        if let Some(settings) = settings {
            session.settings = settings;
        }

        let snapshot = SessionSnapshot::from(&session);
        tracing::info!("Session {} created by '{}'", session.id, host_id);
        self.store.insert(session).await;

        self.broadcaster
            .unicast(
                &host_id,
                &ServerEvent::StreamCreated {
                    session: snapshot.clone(),
                },
            )
            .await;
        Ok(snapshot)
    }

    /// Transition `created → live` and announce it session-wide.
    pub async fn start_stream(
        &self,
        session_id: &str,
        requester: &UserId,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let (audience, started_at) = {
            let mut session = handle.lock().await;
            let now = Timestamp::new(self.clock.now_utc_millis());
            session.start(requester, now)?;
            (session.audience_ids(), now.value())
        };

        tracing::info!("Session {} went live", id);
        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::StreamStarted {
                    session_id: id.to_string(),
                    started_at,
                },
            )
            .await;
        Ok(())
    }

    /// Transition to `ended` (from `live`, or from `created` as a
    /// cancellation), announce it to everyone who was in the session and
    /// drop the session from the store. The final analytics travel with
    /// the `stream_ended` event; an ended session is no longer
    /// addressable.
    pub async fn end_stream(
        &self,
        session_id: &str,
        requester: &UserId,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let (audience, ended_at, reason, analytics) = {
            let mut session = handle.lock().await;
            // Capture the audience first; ending releases the viewers.
            let audience = session.audience_ids();
            let reason = if session.started_at.is_some() {
                "ended"
            } else {
                "cancelled"
            };
            let now = Timestamp::new(self.clock.now_utc_millis());
            session.end(requester, now)?;
            (audience, now.value(), reason, session.analytics.clone())
        };

        tracing::info!("Session {} ended ({})", id, reason);
        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::StreamEnded {
                    session_id: id.to_string(),
                    ended_at,
                    reason: reason.to_string(),
                    analytics,
                },
            )
            .await;

        self.store.remove(&id).await;
        tracing::debug!("Session {} pruned from the store", id);
        Ok(())
    }
}
