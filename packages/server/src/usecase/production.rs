//! UseCase: production controls (tracks, settings, highlights, analytics).
//!
//! Durable writes (highlights, settings) are fire-and-forget: the
//! in-memory state and the fan-out never wait on the store, and a store
//! failure is logged without rolling anything back.

use std::sync::Arc;

use crate::domain::{CoordinatorError, DurableStore, HighlightRecord, UserId};
use crate::infrastructure::dto::websocket::ServerEvent;
use crate::infrastructure::{Broadcaster, SessionStore};

use super::parse_session_id;

pub struct ProductionUseCase {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
    durable: Arc<dyn DurableStore>,
}

impl ProductionUseCase {
    pub fn new(
        store: Arc<SessionStore>,
        broadcaster: Arc<Broadcaster>,
        durable: Arc<dyn DurableStore>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            durable,
        }
    }

    /// Toggle the requester's audio track and tell the other participants.
    pub async fn toggle_audio(
        &self,
        session_id: &str,
        requester: &UserId,
        enabled: bool,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let participants = {
            let mut session = handle.lock().await;
            session.set_audio(requester, enabled)?;
            session.participant_ids()
        };

        self.broadcaster
            .fan_out(
                &participants,
                &ServerEvent::AudioToggled {
                    session_id: id.to_string(),
                    user_id: requester.to_string(),
                    enabled,
                },
            )
            .await;
        Ok(())
    }

    /// Toggle the requester's video track and tell the other participants.
    pub async fn toggle_video(
        &self,
        session_id: &str,
        requester: &UserId,
        enabled: bool,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let participants = {
            let mut session = handle.lock().await;
            session.set_video(requester, enabled)?;
            session.participant_ids()
        };

        self.broadcaster
            .fan_out(
                &participants,
                &ServerEvent::VideoToggled {
                    session_id: id.to_string(),
                    user_id: requester.to_string(),
                    enabled,
                },
            )
            .await;
        Ok(())
    }

    /// Replace the session's production settings. Host only.
    pub async fn update_settings(
        &self,
        session_id: &str,
        requester: &UserId,
        settings: serde_json::Value,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let participants = {
            let mut session = handle.lock().await;
            session.update_settings(requester, settings.clone())?;
            session.participant_ids()
        };

        let durable = self.durable.clone();
        let stream_id = id.to_string();
        let persisted = settings.clone();
        tokio::spawn(async move {
            if let Err(e) = durable.update_stream_settings(&stream_id, persisted).await {
                tracing::warn!("Failed to persist settings for session {}: {}", stream_id, e);
            }
        });

        self.broadcaster
            .fan_out(
                &participants,
                &ServerEvent::SettingsUpdated {
                    session_id: id.to_string(),
                    settings,
                },
            )
            .await;
        Ok(())
    }

    /// Record a highlight marker and announce it session-wide.
    pub async fn create_highlight(
        &self,
        session_id: &str,
        requester: &UserId,
        start_time: i64,
        end_time: i64,
        kind: String,
        score: f64,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let audience = {
            let session = handle.lock().await;
            if !session.is_participant(requester) {
                return Err(CoordinatorError::NotAParticipant);
            }
            session.audience_ids()
        };

        let durable = self.durable.clone();
        let record = HighlightRecord {
            stream_id: id.to_string(),
            start_time,
            end_time,
            kind: kind.clone(),
            score,
        };
        tokio::spawn(async move {
            let stream_id = record.stream_id.clone();
            if let Err(e) = durable.create_highlight(record).await {
                tracing::warn!("Failed to persist highlight for session {}: {}", stream_id, e);
            }
        });

        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::HighlightCreated {
                    session_id: id.to_string(),
                    start_time,
                    end_time,
                    kind,
                    score,
                },
            )
            .await;
        Ok(())
    }

    /// Return the current counters to the requesting member.
    pub async fn get_analytics(
        &self,
        session_id: &str,
        requester: &UserId,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let analytics = {
            let session = handle.lock().await;
            if !session.is_member(requester) {
                return Err(CoordinatorError::NotAParticipant);
            }
            session.analytics.clone()
        };

        self.broadcaster
            .unicast(
                requester,
                &ServerEvent::Analytics {
                    session_id: id.to_string(),
                    analytics,
                },
            )
            .await;
        Ok(())
    }
}
