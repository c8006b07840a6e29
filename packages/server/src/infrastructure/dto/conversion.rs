//! Conversion logic between domain entities and wire DTOs.

use crate::domain::{ChatMessage, Participant, Session};
use crate::infrastructure::dto::websocket as dto;

impl From<&Participant> for dto::ParticipantDto {
    fn from(p: &Participant) -> Self {
        Self {
            user_id: p.user_id.as_str().to_string(),
            role: p.role,
            is_verified: p.is_verified,
            audio_enabled: p.audio_enabled,
            video_enabled: p.video_enabled,
            connected: p.connection.is_some(),
        }
    }
}

impl From<&ChatMessage> for dto::ChatMessageDto {
    fn from(m: &ChatMessage) -> Self {
        Self {
            id: m.id,
            sender_id: m.sender_id.as_str().to_string(),
            body: m.body.as_str().to_string(),
            kind: m.kind,
            pinned: m.pinned,
            created_at: m.created_at.value(),
        }
    }
}

impl From<&Session> for dto::SessionSnapshot {
    fn from(session: &Session) -> Self {
        let mut participants: Vec<dto::ParticipantDto> =
            session.participants.values().map(Into::into).collect();
        // Stable order for clients and tests
        participants.sort_by(|a, b| a.user_id.cmp(&b.user_id));

        Self {
            session_id: session.id.to_string(),
            host_id: session.host_id.as_str().to_string(),
            title: session.title.clone(),
            status: session.status,
            created_at: session.created_at.value(),
            started_at: session.started_at.map(|t| t.value()),
            participants,
            current_viewers: session.analytics.current_viewers,
            pinned_messages: session
                .chat
                .iter()
                .filter(|m| m.pinned)
                .map(Into::into)
                .collect(),
        }
    }
}
