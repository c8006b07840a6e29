//! Message router: envelope parsing, the authentication gate and
//! exhaustive dispatch to the usecase layer.
//!
//! Every inbound text frame passes through `dispatch`. A frame that is
//! not JSON, or a known type with a malformed payload, is a
//! `bad_request`; a well-formed envelope with a type we do not handle is
//! an `unknown_message_type`. `authenticate` is the only type accepted
//! before an identity is bound to the connection.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{CoordinatorError, UserId};
use crate::infrastructure::dto::websocket::{ClientEnvelope, ServerEvent};
use crate::infrastructure::{ConnectionSender, OutboundCommand};
use crate::usecase::SignalKind;

use super::state::AppState;

/// Per-connection routing state: the connection id, the delivery channel
/// and the identity once `authenticate` succeeds.
pub struct ConnectionContext {
    pub connection_id: Uuid,
    pub user_id: Option<UserId>,
    pub sender: ConnectionSender,
}

impl ConnectionContext {
    pub fn new(connection_id: Uuid, sender: ConnectionSender) -> Self {
        Self {
            connection_id,
            user_id: None,
            sender,
        }
    }

    fn require_identity(&self) -> Result<UserId, CoordinatorError> {
        self.user_id
            .clone()
            .ok_or(CoordinatorError::Unauthenticated)
    }
}

/// Route one inbound text frame.
pub async fn dispatch(
    state: &Arc<AppState>,
    ctx: &mut ConnectionContext,
    text: &str,
) -> Result<(), CoordinatorError> {
    let envelope = parse_envelope(text)?;

    if let ClientEnvelope::Authenticate { user_id } = envelope {
        return authenticate(state, ctx, &user_id).await;
    }

    let user_id = ctx.require_identity()?;
    match envelope {
        // Handled above
        ClientEnvelope::Authenticate { .. } => unreachable!(),
        ClientEnvelope::CreateStream { title, settings } => {
            state
                .lifecycle_usecase
                .create_stream(user_id, ctx.connection_id, title, settings)
                .await?;
            Ok(())
        }
        ClientEnvelope::StartStream { session_id } => {
            state
                .lifecycle_usecase
                .start_stream(&session_id, &user_id)
                .await
        }
        ClientEnvelope::EndStream { session_id } => {
            state
                .lifecycle_usecase
                .end_stream(&session_id, &user_id)
                .await
        }
        ClientEnvelope::JoinStream { session_id } => {
            state
                .membership_usecase
                .join_viewer(&session_id, user_id, ctx.connection_id)
                .await
        }
        ClientEnvelope::JoinCostar { session_id } => {
            state
                .membership_usecase
                .join_costar(&session_id, user_id, ctx.connection_id)
                .await
        }
        ClientEnvelope::LeaveStream { session_id } => {
            state
                .membership_usecase
                .leave_stream(&session_id, &user_id)
                .await
        }
        ClientEnvelope::InviteCostar {
            session_id,
            user_id: invitee,
        } => {
            state
                .membership_usecase
                .invite_costar(&session_id, &user_id, &invitee)
                .await
        }
        ClientEnvelope::RemoveCostar {
            session_id,
            user_id: target,
        } => {
            state
                .membership_usecase
                .remove_costar(&session_id, &user_id, &target)
                .await
        }
        ClientEnvelope::ToggleAudio {
            session_id,
            enabled,
        } => {
            state
                .production_usecase
                .toggle_audio(&session_id, &user_id, enabled)
                .await
        }
        ClientEnvelope::ToggleVideo {
            session_id,
            enabled,
        } => {
            state
                .production_usecase
                .toggle_video(&session_id, &user_id, enabled)
                .await
        }
        ClientEnvelope::ChatMessage { session_id, body } => {
            state
                .chat_usecase
                .send_chat(&session_id, &user_id, body)
                .await
        }
        ClientEnvelope::SendGift {
            session_id,
            gift_id,
            value,
        } => {
            state
                .chat_usecase
                .send_gift(&session_id, &user_id, gift_id, value)
                .await
        }
        ClientEnvelope::PinMessage {
            session_id,
            message_id,
        } => {
            state
                .moderation_usecase
                .pin_message(&session_id, &user_id, message_id)
                .await
        }
        ClientEnvelope::ModerateUser {
            session_id,
            user_id: target,
            action,
        } => {
            state
                .moderation_usecase
                .moderate_user(&session_id, &user_id, &target, action)
                .await
        }
        ClientEnvelope::SignalOffer {
            session_id,
            target_id,
            payload,
        } => {
            state
                .signaling_usecase
                .relay(SignalKind::Offer, &session_id, &user_id, &target_id, payload)
                .await
        }
        ClientEnvelope::SignalAnswer {
            session_id,
            target_id,
            payload,
        } => {
            state
                .signaling_usecase
                .relay(SignalKind::Answer, &session_id, &user_id, &target_id, payload)
                .await
        }
        ClientEnvelope::SignalCandidate {
            session_id,
            target_id,
            payload,
        } => {
            state
                .signaling_usecase
                .relay(
                    SignalKind::Candidate,
                    &session_id,
                    &user_id,
                    &target_id,
                    payload,
                )
                .await
        }
        ClientEnvelope::CreateHighlight {
            session_id,
            start_time,
            end_time,
            kind,
            score,
        } => {
            state
                .production_usecase
                .create_highlight(&session_id, &user_id, start_time, end_time, kind, score)
                .await
        }
        ClientEnvelope::UpdateSettings {
            session_id,
            settings,
        } => {
            state
                .production_usecase
                .update_settings(&session_id, &user_id, settings)
                .await
        }
        ClientEnvelope::GetAnalytics { session_id } => {
            state
                .production_usecase
                .get_analytics(&session_id, &user_id)
                .await
        }
    }
}

/// Bind an identity to this connection.
///
/// The directory lookup is authoritative; an unknown user is rejected.
/// Re-authenticating replaces any previous binding for the same user,
/// which closes the older socket. Re-authenticating an already-bound
/// connection under a different identity disconnects the old identity
/// first.
async fn authenticate(
    state: &Arc<AppState>,
    ctx: &mut ConnectionContext,
    raw_user_id: &str,
) -> Result<(), CoordinatorError> {
    let user_id = UserId::new(raw_user_id.to_string())?;
    let profile = match state.directory.get_user(&user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return Err(CoordinatorError::InvalidUser(user_id.to_string())),
        Err(e) => {
            tracing::warn!("Directory lookup for '{}' failed: {}", user_id, e);
            return Err(CoordinatorError::InvalidUser(user_id.to_string()));
        }
    };

    // A connection switching identity must release the old one first,
    // or its binding would keep pointing at this socket until the
    // liveness monitor reaps it.
    if let Some(previous) = ctx.user_id.clone() {
        if previous != user_id {
            tracing::info!(
                "Connection {} re-authenticating '{}' as '{}'",
                ctx.connection_id,
                previous,
                user_id
            );
            state
                .disconnect_usecase
                .execute(&previous, ctx.connection_id)
                .await;
        }
    }

    let replaced = state
        .registry
        .bind(user_id.clone(), ctx.connection_id, ctx.sender.clone())
        .await;
    if let Some(old_sender) = replaced {
        // A repeated authenticate on the same connection replaces its
        // own entry; only a genuinely different socket gets closed.
        if !old_sender.same_channel(&ctx.sender) {
            tracing::info!("'{}' re-authenticated; closing previous connection", user_id);
            let _ = old_sender.send(OutboundCommand::Close);
        }
    }

    ctx.user_id = Some(user_id.clone());
    tracing::info!(
        "Connection {} authenticated as '{}'",
        ctx.connection_id,
        user_id
    );

    let event = ServerEvent::Authenticated {
        user_id: user_id.to_string(),
        display_name: profile.display_name,
    };
    let _ = ctx.sender.send(OutboundCommand::Event(event.to_json()));
    Ok(())
}

/// Parse a raw frame into an envelope, distinguishing malformed payloads
/// from unknown message types.
fn parse_envelope(text: &str) -> Result<ClientEnvelope, CoordinatorError> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| CoordinatorError::BadRequest(format!("invalid JSON: {e}")))?;

    match serde_json::from_value::<ClientEnvelope>(value.clone()) {
        Ok(envelope) => Ok(envelope),
        Err(e) => match value.get("type").and_then(|t| t.as_str()) {
            Some(kind) if !ClientEnvelope::KNOWN_TYPES.contains(&kind) => {
                Err(CoordinatorError::UnknownMessageType(kind.to_string()))
            }
            Some(_) => Err(CoordinatorError::BadRequest(format!(
                "malformed payload: {e}"
            ))),
            None => Err(CoordinatorError::BadRequest(
                "missing message type".to_string(),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{
        Broadcaster, ConnectionRegistry, InMemoryDurableStore, InMemoryUserDirectory,
        InMemoryVerificationService, SessionStore,
    };
    use crate::usecase::{
        ChatUseCase, DisconnectUseCase, LifecycleUseCase, MembershipUseCase, ModerationUseCase,
        ProductionUseCase, SignalingUseCase,
    };
    use costream_shared::time::FixedClock;
    use tokio::sync::mpsc;

    fn test_state() -> Arc<AppState> {
        let registry = Arc::new(ConnectionRegistry::new());
        let store = Arc::new(SessionStore::new());
        let broadcaster = Arc::new(Broadcaster::new(registry.clone()));
        let directory = Arc::new(InMemoryUserDirectory::accepting_anyone());
        let verification = Arc::new(InMemoryVerificationService::approving_everyone());
        let durable = Arc::new(InMemoryDurableStore::new());
        let clock = Arc::new(FixedClock::new(5_000));

        Arc::new(AppState {
            registry: registry.clone(),
            store: store.clone(),
            directory: directory.clone(),
            lifecycle_usecase: Arc::new(LifecycleUseCase::new(
                store.clone(),
                broadcaster.clone(),
                clock.clone(),
            )),
            membership_usecase: Arc::new(MembershipUseCase::new(
                store.clone(),
                broadcaster.clone(),
                verification,
                directory,
                clock.clone(),
            )),
            chat_usecase: Arc::new(ChatUseCase::new(
                store.clone(),
                broadcaster.clone(),
                clock.clone(),
            )),
            moderation_usecase: Arc::new(ModerationUseCase::new(
                store.clone(),
                broadcaster.clone(),
            )),
            signaling_usecase: Arc::new(SignalingUseCase::new(
                store.clone(),
                broadcaster.clone(),
            )),
            production_usecase: Arc::new(ProductionUseCase::new(
                store.clone(),
                broadcaster.clone(),
                durable,
            )),
            disconnect_usecase: Arc::new(DisconnectUseCase::new(
                store,
                registry,
                broadcaster,
            )),
        })
    }

    fn context() -> (ConnectionContext, mpsc::UnboundedReceiver<OutboundCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectionContext::new(Uuid::new_v4(), tx), rx)
    }

    #[tokio::test]
    async fn test_authenticate_binds_identity() {
        // given:
        let state = test_state();
        let (mut ctx, mut rx) = context();

        // when:
        dispatch(&state, &mut ctx, r#"{"type":"authenticate","user_id":"alice"}"#)
            .await
            .unwrap();

        // then:
        assert_eq!(ctx.user_id, Some(UserId::new("alice".to_string()).unwrap()));
        assert_eq!(state.registry.connected_count().await, 1);
        let frame = rx.recv().await.unwrap();
        match frame {
            OutboundCommand::Event(json) => assert!(json.contains("authenticated")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthenticated_operation_is_rejected() {
        // given:
        let state = test_state();
        let (mut ctx, _rx) = context();

        // when:
        let result = dispatch(
            &state,
            &mut ctx,
            r#"{"type":"create_stream","title":"show"}"#,
        )
        .await;

        // then:
        assert_eq!(result, Err(CoordinatorError::Unauthenticated));
        assert_eq!(state.store.count().await, 0);
    }

    #[tokio::test]
    async fn test_non_json_frame_is_bad_request() {
        // given:
        let state = test_state();
        let (mut ctx, _rx) = context();

        // when:
        let result = dispatch(&state, &mut ctx, "hello there").await;

        // then:
        assert!(matches!(result, Err(CoordinatorError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_type_is_distinguished_from_bad_payload() {
        // given:
        let state = test_state();
        let (mut ctx, _rx) = context();

        // when: a type we never handle
        let unknown = dispatch(&state, &mut ctx, r#"{"type":"teleport"}"#).await;

        // then:
        assert_eq!(
            unknown,
            Err(CoordinatorError::UnknownMessageType("teleport".to_string()))
        );

        // when: a known type with a missing field
        let malformed = dispatch(&state, &mut ctx, r#"{"type":"start_stream"}"#).await;

        // then:
        assert!(matches!(malformed, Err(CoordinatorError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_authenticated_create_and_start_flow() {
        // given:
        let state = test_state();
        let (mut ctx, mut rx) = context();
        dispatch(&state, &mut ctx, r#"{"type":"authenticate","user_id":"host"}"#)
            .await
            .unwrap();
        rx.recv().await; // authenticated

        // when:
        dispatch(
            &state,
            &mut ctx,
            r#"{"type":"create_stream","title":"my show"}"#,
        )
        .await
        .unwrap();

        // then: session exists and the host got the snapshot
        assert_eq!(state.store.count().await, 1);
        let frame = rx.recv().await.unwrap();
        let json = match frame {
            OutboundCommand::Event(json) => json,
            other => panic!("unexpected command: {other:?}"),
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "stream_created");
        let session_id = value["session"]["session_id"].as_str().unwrap().to_string();

        // when: starting it through the router
        let start = format!(r#"{{"type":"start_stream","session_id":"{session_id}"}}"#);
        dispatch(&state, &mut ctx, &start).await.unwrap();

        // then:
        let frame = rx.recv().await.unwrap();
        match frame {
            OutboundCommand::Event(json) => assert!(json.contains("stream_started")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reauthentication_closes_previous_connection() {
        // given: alice authenticated on an old connection
        let state = test_state();
        let (mut old_ctx, mut old_rx) = context();
        dispatch(
            &state,
            &mut old_ctx,
            r#"{"type":"authenticate","user_id":"alice"}"#,
        )
        .await
        .unwrap();
        old_rx.recv().await; // authenticated

        // when: alice authenticates again on a new connection
        let (mut new_ctx, _new_rx) = context();
        dispatch(
            &state,
            &mut new_ctx,
            r#"{"type":"authenticate","user_id":"alice"}"#,
        )
        .await
        .unwrap();

        // then: the old connection is told to close
        assert_eq!(old_rx.recv().await, Some(OutboundCommand::Close));
        assert_eq!(state.registry.connected_count().await, 1);
    }

    #[tokio::test]
    async fn test_reauthentication_as_another_user_releases_old_binding() {
        // given: a connection authenticated as alice
        let state = test_state();
        let (mut ctx, mut rx) = context();
        dispatch(
            &state,
            &mut ctx,
            r#"{"type":"authenticate","user_id":"alice"}"#,
        )
        .await
        .unwrap();
        rx.recv().await; // authenticated

        // when: the same connection authenticates as bob
        dispatch(&state, &mut ctx, r#"{"type":"authenticate","user_id":"bob"}"#)
            .await
            .unwrap();

        // then: alice's binding is gone, bob owns the connection
        let alice = UserId::new("alice".to_string()).unwrap();
        let bob = UserId::new("bob".to_string()).unwrap();
        assert!(state.registry.lookup(&alice).await.is_none());
        assert!(state.registry.lookup(&bob).await.is_some());
        assert_eq!(state.registry.connected_count().await, 1);
        assert_eq!(ctx.user_id, Some(bob));

        // and: the connection itself stays open
        let frame = rx.recv().await.unwrap();
        match frame {
            OutboundCommand::Event(json) => assert!(json.contains("authenticated")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeated_authenticate_on_same_connection_stays_open() {
        // given: an authenticated connection
        let state = test_state();
        let (mut ctx, mut rx) = context();
        let frame = r#"{"type":"authenticate","user_id":"alice"}"#;
        dispatch(&state, &mut ctx, frame).await.unwrap();
        rx.recv().await; // authenticated

        // when: the client sends authenticate again for the same user
        dispatch(&state, &mut ctx, frame).await.unwrap();

        // then: a fresh confirmation arrives instead of a close
        let frame = rx.recv().await.unwrap();
        match frame {
            OutboundCommand::Event(json) => assert!(json.contains("authenticated")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(state.registry.connected_count().await, 1);
    }
}
