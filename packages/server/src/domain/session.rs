//! Session entity: lifecycle state machine, membership and chat state.
//!
//! A `Session` is one live broadcast with a host, optional co-stars and an
//! audience of viewers. All rules that only depend on session state live
//! here as synchronous methods; the usecase layer is responsible for
//! locking, external lookups and fan-out.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::CoordinatorError;
use super::value_object::{MessageBody, SessionId, Timestamp, UserId};

/// Lifecycle status of a session.
///
/// Legal transitions: `created → live`, `live → ended` and the
/// cancellation edge `created → ended`. `ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Live,
    Ended,
}

/// Role of an on-camera session member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Host,
    Costar,
    Moderator,
}

/// On-camera session member (host, co-star or moderator).
///
/// `connection` is the id of the live connection, or `None` while the
/// member is temporarily disconnected but still part of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub role: ParticipantRole,
    pub is_verified: bool,
    pub audio_enabled: bool,
    pub video_enabled: bool,
    pub connection: Option<Uuid>,
}

/// Off-camera audience member. Ephemeral: removed entirely on disconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewer {
    pub user_id: UserId,
    pub connection: Uuid,
    pub joined_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageKind {
    Text,
    System,
    Gift,
}

/// Immutable once created, except for the `pinned` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: UserId,
    pub body: MessageBody,
    pub kind: ChatMessageKind,
    pub pinned: bool,
    pub created_at: Timestamp,
}

/// Per-session counters. Monotonic except `current_viewers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub current_viewers: u64,
    pub peak_viewers: u64,
    pub total_messages: u64,
    pub total_gifts: u64,
    pub gift_value_total: u64,
}

/// Moderation actions available to hosts and moderators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Timeout,
    Ban,
    Unban,
}

/// One live broadcast session.
///
/// Owned exclusively by the session store; everything nested (participants,
/// viewers, chat) is owned by the session and only reachable through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub host_id: UserId,
    pub title: String,
    pub status: SessionStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub ended_at: Option<Timestamp>,
    pub participants: HashMap<UserId, Participant>,
    pub viewers: HashMap<UserId, Viewer>,
    /// Pending co-star invites. Not membership: access is re-checked at
    /// join time against the verification service.
    pub invites: HashSet<UserId>,
    /// Session-scoped bans; lifted by `unban`, never persisted here.
    pub banned: HashSet<UserId>,
    pub chat: Vec<ChatMessage>,
    pub analytics: SessionAnalytics,
    /// Host-controlled production settings, forwarded verbatim.
    pub settings: serde_json::Value,
}

impl Session {
    /// Allocate a new session in `created` with the host as its first
    /// participant.
    pub fn new(
        id: SessionId,
        host_id: UserId,
        title: String,
        host_connection: Uuid,
        now: Timestamp,
    ) -> Result<Self, CoordinatorError> {
        if title.trim().is_empty() {
            return Err(CoordinatorError::InvalidConfig(
                "title must not be empty".to_string(),
            ));
        }

        let host = Participant {
            user_id: host_id.clone(),
            role: ParticipantRole::Host,
            is_verified: true,
            audio_enabled: true,
            video_enabled: true,
            connection: Some(host_connection),
        };
        let mut participants = HashMap::new();
        participants.insert(host_id.clone(), host);

        Ok(Self {
            id,
            host_id,
            title,
            status: SessionStatus::Created,
            created_at: now,
            started_at: None,
            ended_at: None,
            participants,
            viewers: HashMap::new(),
            invites: HashSet::new(),
            banned: HashSet::new(),
            chat: Vec::new(),
            analytics: SessionAnalytics::default(),
            settings: serde_json::Value::Null,
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle state machine
    // ------------------------------------------------------------------

    /// Transition `created → live`. Host only.
    pub fn start(&mut self, requester: &UserId, now: Timestamp) -> Result<(), CoordinatorError> {
        self.require_host(requester)?;
        if self.status != SessionStatus::Created {
            return Err(CoordinatorError::InvalidState(format!(
                "cannot start stream from status {:?}",
                self.status
            )));
        }
        self.status = SessionStatus::Live;
        self.started_at = Some(now);
        Ok(())
    }

    /// Transition to `ended`. Host only.
    ///
    /// Legal from `live` (normal end) and from `created` (cancellation).
    /// Releases every participant connection reference and finalizes the
    /// viewer counter; it does not force-disconnect anybody.
    pub fn end(&mut self, requester: &UserId, now: Timestamp) -> Result<(), CoordinatorError> {
        self.require_host(requester)?;
        if self.status == SessionStatus::Ended {
            return Err(CoordinatorError::InvalidState(
                "stream already ended".to_string(),
            ));
        }
        self.status = SessionStatus::Ended;
        self.ended_at = Some(now);
        for participant in self.participants.values_mut() {
            participant.connection = None;
        }
        // Viewer records are ephemeral; the audience of a dead session is
        // released here, the connections themselves stay open.
        self.viewers.clear();
        self.analytics.current_viewers = 0;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Add an audience member.
    ///
    /// Participants may not simultaneously be viewers; banned users are
    /// rejected until unbanned. A viewer reconnecting replaces its own
    /// entry without touching the counters twice.
    pub fn add_viewer(
        &mut self,
        user_id: UserId,
        connection: Uuid,
        now: Timestamp,
    ) -> Result<(), CoordinatorError> {
        self.require_open()?;
        if self.participants.contains_key(&user_id) {
            return Err(CoordinatorError::Forbidden(
                "already a participant of this session".to_string(),
            ));
        }
        if self.banned.contains(&user_id) {
            return Err(CoordinatorError::Forbidden(
                "user is banned from this session".to_string(),
            ));
        }

        let rejoining = self.viewers.contains_key(&user_id);
        self.viewers.insert(
            user_id.clone(),
            Viewer {
                user_id,
                connection,
                joined_at: now,
            },
        );
        if !rejoining {
            self.analytics.current_viewers += 1;
            if self.analytics.current_viewers > self.analytics.peak_viewers {
                self.analytics.peak_viewers = self.analytics.current_viewers;
            }
        }
        Ok(())
    }

    /// Remove an audience member. No-op if the user is not a viewer.
    pub fn remove_viewer(&mut self, user_id: &UserId) -> bool {
        if self.viewers.remove(user_id).is_some() {
            self.analytics.current_viewers = self.analytics.current_viewers.saturating_sub(1);
            true
        } else {
            false
        }
    }

    /// Record a pending co-star invite. Host only.
    pub fn invite_costar(
        &mut self,
        requester: &UserId,
        invitee: UserId,
    ) -> Result<(), CoordinatorError> {
        self.require_host(requester)?;
        self.require_open()?;
        if self.participants.contains_key(&invitee) {
            return Err(CoordinatorError::Forbidden(
                "user is already a participant".to_string(),
            ));
        }
        self.invites.insert(invitee);
        Ok(())
    }

    /// Whether a co-star join attempt is admissible before verification:
    /// the user was invited, or already holds a participant record.
    pub fn costar_admissible(&self, user_id: &UserId) -> bool {
        self.invites.contains(user_id) || self.participants.contains_key(user_id)
    }

    /// Commit a verified co-star join. Callers must have confirmed the
    /// verification status first; this only mutates session state.
    pub fn add_costar(
        &mut self,
        user_id: UserId,
        connection: Uuid,
    ) -> Result<(), CoordinatorError> {
        self.require_open()?;
        if !self.costar_admissible(&user_id) {
            return Err(CoordinatorError::Forbidden(
                "co-star join requires an invitation".to_string(),
            ));
        }

        // A viewer promoted to co-star leaves the audience first so the
        // participant and viewer key sets stay disjoint.
        self.remove_viewer(&user_id);
        self.invites.remove(&user_id);

        match self.participants.get_mut(&user_id) {
            Some(existing) => {
                // Rejoin of a temporarily disconnected member.
                existing.connection = Some(connection);
            }
            None => {
                self.participants.insert(
                    user_id.clone(),
                    Participant {
                        user_id,
                        role: ParticipantRole::Costar,
                        is_verified: true,
                        audio_enabled: true,
                        video_enabled: true,
                        connection: Some(connection),
                    },
                );
            }
        }
        Ok(())
    }

    /// Remove a co-star. Host only; the host itself cannot be removed.
    pub fn remove_costar(
        &mut self,
        requester: &UserId,
        target: &UserId,
    ) -> Result<(), CoordinatorError> {
        self.require_host(requester)?;
        if target == &self.host_id {
            return Err(CoordinatorError::Forbidden(
                "the host cannot be removed".to_string(),
            ));
        }
        self.invites.remove(target);
        if self.participants.remove(target).is_none() {
            return Err(CoordinatorError::NotAParticipant);
        }
        Ok(())
    }

    /// Mark a participant as temporarily disconnected, keeping membership.
    pub fn participant_disconnected(&mut self, user_id: &UserId) -> bool {
        match self.participants.get_mut(user_id) {
            Some(p) => {
                p.connection = None;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Chat and production
    // ------------------------------------------------------------------

    /// Append a chat message. Any current member (participant or viewer)
    /// may send; order of acceptance is delivery order.
    pub fn add_chat(
        &mut self,
        sender_id: UserId,
        body: MessageBody,
        kind: ChatMessageKind,
        id: Uuid,
        now: Timestamp,
    ) -> Result<ChatMessage, CoordinatorError> {
        self.require_open()?;
        if !self.is_member(&sender_id) {
            return Err(CoordinatorError::Forbidden(
                "only session members may chat".to_string(),
            ));
        }
        let message = ChatMessage {
            id,
            sender_id,
            body,
            kind,
            pinned: false,
            created_at: now,
        };
        self.chat.push(message.clone());
        self.analytics.total_messages += 1;
        if kind == ChatMessageKind::Gift {
            self.analytics.total_gifts += 1;
        }
        Ok(message)
    }

    /// Record gift value on top of the gift-announcement chat entry.
    pub fn record_gift_value(&mut self, value: u64) {
        self.analytics.gift_value_total += value;
    }

    /// Flag a chat message as pinned. Host or moderator only.
    pub fn pin_message(
        &mut self,
        requester: &UserId,
        message_id: Uuid,
    ) -> Result<&ChatMessage, CoordinatorError> {
        self.require_moderator(requester)?;
        match self.chat.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.pinned = true;
                Ok(message)
            }
            None => Err(CoordinatorError::BadRequest(format!(
                "no such chat message: {message_id}"
            ))),
        }
    }

    /// Apply a moderation action to a viewer. Host or moderator only.
    ///
    /// Timeout and ban evict the viewer and block rejoining until `unban`;
    /// returns `true` when the target was evicted from the audience.
    pub fn moderate(
        &mut self,
        requester: &UserId,
        target: &UserId,
        action: ModerationAction,
    ) -> Result<bool, CoordinatorError> {
        self.require_moderator(requester)?;
        match action {
            ModerationAction::Timeout | ModerationAction::Ban => {
                if self.participants.contains_key(target) {
                    return Err(CoordinatorError::Forbidden(
                        "participants cannot be banned; remove them instead".to_string(),
                    ));
                }
                self.banned.insert(target.clone());
                Ok(self.remove_viewer(target))
            }
            ModerationAction::Unban => {
                self.banned.remove(target);
                Ok(false)
            }
        }
    }

    /// Replace the production settings. Host only.
    pub fn update_settings(
        &mut self,
        requester: &UserId,
        settings: serde_json::Value,
    ) -> Result<(), CoordinatorError> {
        self.require_host(requester)?;
        self.settings = settings;
        Ok(())
    }

    /// Toggle a participant's audio track state.
    pub fn set_audio(&mut self, user_id: &UserId, enabled: bool) -> Result<(), CoordinatorError> {
        match self.participants.get_mut(user_id) {
            Some(p) => {
                p.audio_enabled = enabled;
                Ok(())
            }
            None => Err(CoordinatorError::NotAParticipant),
        }
    }

    /// Toggle a participant's video track state.
    pub fn set_video(&mut self, user_id: &UserId, enabled: bool) -> Result<(), CoordinatorError> {
        match self.participants.get_mut(user_id) {
            Some(p) => {
                p.video_enabled = enabled;
                Ok(())
            }
            None => Err(CoordinatorError::NotAParticipant),
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn is_participant(&self, user_id: &UserId) -> bool {
        self.participants.contains_key(user_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.participants.contains_key(user_id) || self.viewers.contains_key(user_id)
    }

    /// Participant ids, for participants-only fan-out.
    pub fn participant_ids(&self) -> Vec<UserId> {
        self.participants.keys().cloned().collect()
    }

    /// Participant + viewer ids, for session-wide fan-out.
    pub fn audience_ids(&self) -> Vec<UserId> {
        self.participants
            .keys()
            .chain(self.viewers.keys())
            .cloned()
            .collect()
    }

    fn require_host(&self, requester: &UserId) -> Result<(), CoordinatorError> {
        if requester != &self.host_id {
            return Err(CoordinatorError::Forbidden(
                "only the host may perform this action".to_string(),
            ));
        }
        Ok(())
    }

    fn require_moderator(&self, requester: &UserId) -> Result<(), CoordinatorError> {
        match self.participants.get(requester) {
            Some(p) if matches!(p.role, ParticipantRole::Host | ParticipantRole::Moderator) => {
                Ok(())
            }
            Some(_) => Err(CoordinatorError::Forbidden(
                "moderation requires the host or moderator role".to_string(),
            )),
            None => Err(CoordinatorError::NotAParticipant),
        }
    }

    fn require_open(&self) -> Result<(), CoordinatorError> {
        if self.status == SessionStatus::Ended {
            return Err(CoordinatorError::InvalidState(
                "stream has ended".to_string(),
            ));
        }
        Ok(())
    }
}
