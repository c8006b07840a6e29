//! UseCase: session membership (viewer joins, verification-gated co-star
//! joins, invites, removals, explicit leave).
//!
//! The verification lookup is the one slow external call in the
//! coordinator. It is awaited without holding the session lock; the join
//! is committed afterwards under the lock, re-validating that the session
//! still exists and the invite still holds.

use std::sync::Arc;

use costream_shared::time::Clock;
use uuid::Uuid;

use crate::domain::{
    CoordinatorError, ParticipantRole, Timestamp, UserDirectory, UserId, UserProfile,
    VerificationService,
};
use crate::infrastructure::dto::websocket::{ServerEvent, SessionSnapshot};
use crate::infrastructure::{Broadcaster, SessionStore};

use super::{parse_session_id, parse_user_id};

pub struct MembershipUseCase {
    store: Arc<SessionStore>,
    broadcaster: Arc<Broadcaster>,
    verification: Arc<dyn VerificationService>,
    directory: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
}

impl MembershipUseCase {
    pub fn new(
        store: Arc<SessionStore>,
        broadcaster: Arc<Broadcaster>,
        verification: Arc<dyn VerificationService>,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            verification,
            directory,
            clock,
        }
    }

    async fn require_profile(&self, user_id: &UserId) -> Result<UserProfile, CoordinatorError> {
        match self.directory.get_user(user_id).await {
            Ok(Some(profile)) => Ok(profile),
            Ok(None) => Err(CoordinatorError::InvalidUser(user_id.to_string())),
            Err(e) => {
                tracing::warn!("Profile lookup for '{}' failed: {}", user_id, e);
                Err(CoordinatorError::InvalidUser(user_id.to_string()))
            }
        }
    }

    /// Join the audience of a session.
    pub async fn join_viewer(
        &self,
        session_id: &str,
        user_id: UserId,
        connection_id: Uuid,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let profile = self.require_profile(&user_id).await?;
        let handle = self.store.require(&id).await?;

        let (snapshot, others) = {
            let mut session = handle.lock().await;
            let now = Timestamp::new(self.clock.now_utc_millis());
            session.add_viewer(user_id.clone(), connection_id, now)?;
            let others: Vec<UserId> = session
                .audience_ids()
                .into_iter()
                .filter(|id| id != &user_id)
                .collect();
            (SessionSnapshot::from(&*session), others)
        };

        tracing::info!("'{}' joined session {} as viewer", user_id, id);
        let current_viewers = snapshot.current_viewers;
        self.broadcaster
            .unicast(
                &user_id,
                &ServerEvent::JoinedAsViewer {
                    session: snapshot,
                    user_id: user_id.to_string(),
                    display_name: profile.display_name.clone(),
                },
            )
            .await;
        self.broadcaster
            .fan_out(
                &others,
                &ServerEvent::ViewerJoined {
                    session_id: id.to_string(),
                    user_id: user_id.to_string(),
                    display_name: profile.display_name,
                    current_viewers,
                },
            )
            .await;
        Ok(())
    }

    /// Join on camera as a co-star.
    ///
    /// Requires an invitation (or an existing participant record) and a
    /// fresh pass from the verification service.
    pub async fn join_costar(
        &self,
        session_id: &str,
        user_id: UserId,
        connection_id: Uuid,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;

        // First check: fail fast before the slow verification call.
        {
            let handle = self.store.require(&id).await?;
            let session = handle.lock().await;
            if !session.costar_admissible(&user_id) {
                return Err(CoordinatorError::Forbidden(
                    "co-star join requires an invitation".to_string(),
                ));
            }
        }

        // Authoritative, never cached; awaited without the session lock.
        let verified = match self.verification.verification_status(&user_id).await {
            Ok(verified) => verified,
            Err(e) => {
                tracing::warn!("Verification lookup for '{}' failed: {}", user_id, e);
                return Err(CoordinatorError::VerificationUnavailable);
            }
        };
        if !verified {
            return Err(CoordinatorError::VerificationRequired);
        }

        let profile = self.require_profile(&user_id).await?;

        // Second check: state may have changed during the await. The
        // entity re-validates the invite and the session status.
        let handle = self.store.require(&id).await?;
        let (snapshot, audience) = {
            let mut session = handle.lock().await;
            session.add_costar(user_id.clone(), connection_id)?;
            (SessionSnapshot::from(&*session), session.audience_ids())
        };

        tracing::info!("'{}' joined session {} as co-star", user_id, id);
        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::JoinedAsParticipant {
                    session: snapshot,
                    user_id: user_id.to_string(),
                    display_name: profile.display_name,
                },
            )
            .await;
        Ok(())
    }

    /// Record a co-star invite. Host only; the invite is a notification
    /// plus a pending record, never membership by itself.
    pub async fn invite_costar(
        &self,
        session_id: &str,
        requester: &UserId,
        invitee_raw: &str,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let invitee = parse_user_id(invitee_raw)?;
        self.require_profile(&invitee).await?;

        let handle = self.store.require(&id).await?;
        let (title, host_id, participants) = {
            let mut session = handle.lock().await;
            session.invite_costar(requester, invitee.clone())?;
            (
                session.title.clone(),
                session.host_id.to_string(),
                session.participant_ids(),
            )
        };

        tracing::info!("'{}' invited to session {} as co-star", invitee, id);
        self.broadcaster
            .unicast(
                &invitee,
                &ServerEvent::CostarInvitation {
                    session_id: id.to_string(),
                    host_id,
                    title,
                },
            )
            .await;
        self.broadcaster
            .fan_out(
                &participants,
                &ServerEvent::CostarInvited {
                    session_id: id.to_string(),
                    user_id: invitee.to_string(),
                },
            )
            .await;
        Ok(())
    }

    /// Remove a co-star. Host only; leaves no residual state.
    pub async fn remove_costar(
        &self,
        session_id: &str,
        requester: &UserId,
        target_raw: &str,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let target = parse_user_id(target_raw)?;

        let handle = self.store.require(&id).await?;
        let participants = {
            let mut session = handle.lock().await;
            session.remove_costar(requester, &target)?;
            session.participant_ids()
        };

        tracing::info!("'{}' removed from session {}", target, id);
        let event = ServerEvent::CostarRemoved {
            session_id: id.to_string(),
            user_id: target.to_string(),
        };
        // Notify the removed user if still connected, then the rest.
        self.broadcaster.unicast(&target, &event).await;
        self.broadcaster.fan_out(&participants, &event).await;
        Ok(())
    }

    /// Explicitly leave a session.
    ///
    /// Viewers are removed entirely; co-stars and moderators give up
    /// their membership. The host cannot leave its own session and must
    /// end it instead.
    pub async fn leave_stream(
        &self,
        session_id: &str,
        user_id: &UserId,
    ) -> Result<(), CoordinatorError> {
        let id = parse_session_id(session_id)?;
        let handle = self.store.require(&id).await?;

        let audience = {
            let mut session = handle.lock().await;
            if user_id == &session.host_id {
                return Err(CoordinatorError::Forbidden(
                    "the host must end the stream instead of leaving".to_string(),
                ));
            }
            let audience = session.audience_ids();
            let was_viewer = session.remove_viewer(user_id);
            let was_participant = match session.participants.get(user_id) {
                Some(p) if p.role != ParticipantRole::Host => {
                    session.participants.remove(user_id);
                    true
                }
                _ => false,
            };
            if !was_viewer && !was_participant {
                return Err(CoordinatorError::NotAParticipant);
            }
            audience
        };

        tracing::info!("'{}' left session {}", user_id, id);
        self.broadcaster
            .fan_out(
                &audience,
                &ServerEvent::LeftStream {
                    session_id: id.to_string(),
                    user_id: user_id.to_string(),
                },
            )
            .await;
        Ok(())
    }
}
