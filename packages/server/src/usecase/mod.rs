//! UseCase layer: one struct per operation group, each holding its
//! dependencies as injected `Arc`s. The websocket router calls into this
//! layer; all session locking happens here.

mod chat;
mod disconnect;
mod lifecycle;
mod membership;
mod moderation;
mod production;
mod signaling;

pub use chat::ChatUseCase;
pub use disconnect::DisconnectUseCase;
pub use lifecycle::LifecycleUseCase;
pub use membership::MembershipUseCase;
pub use moderation::ModerationUseCase;
pub use production::ProductionUseCase;
pub use signaling::{SignalKind, SignalingUseCase};

use crate::domain::{CoordinatorError, SessionId, UserId};

/// Parse a wire session id; a malformed id is a `BadRequest`, an
/// unknown-but-valid one surfaces later as `StreamNotFound`.
pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, CoordinatorError> {
    SessionId::parse(raw).map_err(CoordinatorError::from)
}

/// Parse a wire user id referencing another user.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, CoordinatorError> {
    UserId::new(raw.to_string()).map_err(CoordinatorError::from)
}
