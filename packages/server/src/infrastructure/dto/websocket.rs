//! WebSocket wire envelopes.
//!
//! Inbound and outbound messages are tagged unions over a `type`
//! discriminator; every variant carries its own strongly-typed payload
//! and is dispatched by exhaustive matching in the router.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{ChatMessageKind, ModerationAction, ParticipantRole, SessionAnalytics, SessionStatus};

/// Inbound client envelope.
///
/// `authenticate` is the only type accepted before an identity is bound
/// to the connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    Authenticate {
        user_id: String,
    },
    CreateStream {
        title: String,
        #[serde(default)]
        settings: Option<serde_json::Value>,
    },
    StartStream {
        session_id: String,
    },
    EndStream {
        session_id: String,
    },
    /// Join the audience of a session
    JoinStream {
        session_id: String,
    },
    /// Join on-camera as a co-star (verification-gated)
    JoinCostar {
        session_id: String,
    },
    LeaveStream {
        session_id: String,
    },
    InviteCostar {
        session_id: String,
        user_id: String,
    },
    RemoveCostar {
        session_id: String,
        user_id: String,
    },
    ToggleAudio {
        session_id: String,
        enabled: bool,
    },
    ToggleVideo {
        session_id: String,
        enabled: bool,
    },
    ChatMessage {
        session_id: String,
        body: String,
    },
    SendGift {
        session_id: String,
        gift_id: String,
        value: u64,
    },
    PinMessage {
        session_id: String,
        message_id: Uuid,
    },
    ModerateUser {
        session_id: String,
        user_id: String,
        action: ModerationAction,
    },
    SignalOffer {
        session_id: String,
        target_id: String,
        payload: serde_json::Value,
    },
    SignalAnswer {
        session_id: String,
        target_id: String,
        payload: serde_json::Value,
    },
    SignalCandidate {
        session_id: String,
        target_id: String,
        payload: serde_json::Value,
    },
    CreateHighlight {
        session_id: String,
        start_time: i64,
        end_time: i64,
        kind: String,
        score: f64,
    },
    UpdateSettings {
        session_id: String,
        settings: serde_json::Value,
    },
    GetAnalytics {
        session_id: String,
    },
}

impl ClientEnvelope {
    /// Every `type` value this router handles, used to distinguish an
    /// unknown type from a malformed payload.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "authenticate",
        "create_stream",
        "start_stream",
        "end_stream",
        "join_stream",
        "join_costar",
        "leave_stream",
        "invite_costar",
        "remove_costar",
        "toggle_audio",
        "toggle_video",
        "chat_message",
        "send_gift",
        "pin_message",
        "moderate_user",
        "signal_offer",
        "signal_answer",
        "signal_candidate",
        "create_highlight",
        "update_settings",
        "get_analytics",
    ];
}

/// Participant as rendered on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantDto {
    pub user_id: String,
    pub role: ParticipantRole,
    pub is_verified: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub connected: bool,
}

/// Chat message as rendered on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageDto {
    pub id: Uuid,
    pub sender_id: String,
    pub body: String,
    pub kind: ChatMessageKind,
    pub pinned: bool,
    pub created_at: i64,
}

/// Session status snapshot sent with join confirmations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub host_id: String,
    pub title: String,
    pub status: SessionStatus,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub participants: Vec<ParticipantDto>,
    pub current_viewers: u64,
    pub pinned_messages: Vec<ChatMessageDto>,
}

/// Outbound server event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    ConnectionEstablished {
        connection_id: Uuid,
    },
    Authenticated {
        user_id: String,
        display_name: String,
    },
    StreamCreated {
        session: SessionSnapshot,
    },
    JoinedAsParticipant {
        session: SessionSnapshot,
        user_id: String,
        display_name: String,
    },
    JoinedAsViewer {
        session: SessionSnapshot,
        user_id: String,
        display_name: String,
    },
    ViewerJoined {
        session_id: String,
        user_id: String,
        display_name: String,
        current_viewers: u64,
    },
    LeftStream {
        session_id: String,
        user_id: String,
    },
    StreamStarted {
        session_id: String,
        started_at: i64,
    },
    StreamEnded {
        session_id: String,
        ended_at: i64,
        reason: String,
        analytics: SessionAnalytics,
    },
    /// Sent to the invited user
    CostarInvitation {
        session_id: String,
        host_id: String,
        title: String,
    },
    /// Sent to the session's participants
    CostarInvited {
        session_id: String,
        user_id: String,
    },
    CostarRemoved {
        session_id: String,
        user_id: String,
    },
    AudioToggled {
        session_id: String,
        user_id: String,
        enabled: bool,
    },
    VideoToggled {
        session_id: String,
        user_id: String,
        enabled: bool,
    },
    ChatMessage {
        session_id: String,
        message: ChatMessageDto,
    },
    GiftSent {
        session_id: String,
        sender_id: String,
        gift_id: String,
        value: u64,
        message: ChatMessageDto,
    },
    MessagePinned {
        session_id: String,
        message: ChatMessageDto,
    },
    /// Sent to the session audience
    UserModerated {
        session_id: String,
        user_id: String,
        action: ModerationAction,
    },
    /// Sent to the moderated user itself
    Moderated {
        session_id: String,
        action: ModerationAction,
    },
    SignalOffer {
        session_id: String,
        from_id: String,
        payload: serde_json::Value,
    },
    SignalAnswer {
        session_id: String,
        from_id: String,
        payload: serde_json::Value,
    },
    SignalCandidate {
        session_id: String,
        from_id: String,
        payload: serde_json::Value,
    },
    HighlightCreated {
        session_id: String,
        start_time: i64,
        end_time: i64,
        kind: String,
        score: f64,
    },
    SettingsUpdated {
        session_id: String,
        settings: serde_json::Value,
    },
    Analytics {
        session_id: String,
        analytics: SessionAnalytics,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    /// Serialize for the wire. Events are plain data; serialization
    /// cannot fail in practice, but a broken event must never take the
    /// connection down, so it degrades to an error frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize server event: {}", e);
            r#"{"type":"error","code":"internal","message":"event serialization failed"}"#
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_envelope_parses_tagged_type() {
        // given:
        let json = r#"{"type":"chat_message","session_id":"abc","body":"hello"}"#;

        // when:
        let envelope: ClientEnvelope = serde_json::from_str(json).unwrap();

        // then:
        match envelope {
            ClientEnvelope::ChatMessage { session_id, body } => {
                assert_eq!(session_id, "abc");
                assert_eq!(body, "hello");
            }
            other => panic!("unexpected envelope: {other:?}"),
        }
    }

    #[test]
    fn test_inbound_envelope_rejects_unknown_type() {
        // given:
        let json = r#"{"type":"teleport","session_id":"abc"}"#;

        // when / then:
        assert!(serde_json::from_str::<ClientEnvelope>(json).is_err());
        assert!(!ClientEnvelope::KNOWN_TYPES.contains(&"teleport"));
    }

    #[test]
    fn test_known_types_tracks_every_envelope_variant() {
        // given: serde rejects an unknown tag by listing every accepted one
        let error = serde_json::from_value::<ClientEnvelope>(serde_json::json!({"type": "bogus"}))
            .unwrap_err()
            .to_string();

        // when: the accepted tags are read back out of the rejection
        let variants: Vec<&str> = error.split('`').skip(3).step_by(2).collect();

        // then: the hand-kept list matches the enum exactly, in order
        assert!(!variants.is_empty());
        assert_eq!(variants.as_slice(), ClientEnvelope::KNOWN_TYPES);
    }

    #[test]
    fn test_known_types_cover_moderation_payload() {
        // given:
        let json =
            r#"{"type":"moderate_user","session_id":"abc","user_id":"troll","action":"ban"}"#;

        // when:
        let envelope: ClientEnvelope = serde_json::from_str(json).unwrap();

        // then:
        assert!(matches!(
            envelope,
            ClientEnvelope::ModerateUser {
                action: ModerationAction::Ban,
                ..
            }
        ));
    }

    #[test]
    fn test_outbound_event_serializes_snake_case_tag() {
        // given:
        let event = ServerEvent::StreamStarted {
            session_id: "abc".to_string(),
            started_at: 1_000,
        };

        // when:
        let json = event.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        // then:
        assert_eq!(value["type"], "stream_started");
        assert_eq!(value["started_at"], 1_000);
    }

    #[test]
    fn test_error_event_carries_stable_code() {
        // given:
        let event = ServerEvent::Error {
            code: "verification_required".to_string(),
            message: "identity verification required".to_string(),
        };

        // when:
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();

        // then:
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "verification_required");
    }
}
