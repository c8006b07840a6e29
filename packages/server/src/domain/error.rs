//! Coordinator error taxonomy.
//!
//! Every variant is recoverable at the connection level: it is reported
//! back to the originating connection as an `error` event and never
//! terminates the connection by itself.

use thiserror::Error;

use super::value_object::ValueError;

/// Errors surfaced to clients as structured `error` events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    /// No identity bound on this connection yet
    #[error("connection is not authenticated")]
    Unauthenticated,

    /// Malformed envelope or payload
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Envelope carried a `type` we do not handle
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// Role or ownership check failed
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Lifecycle transition not legal from the current status
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Co-star join blocked: identity verification has not passed
    #[error("identity verification required")]
    VerificationRequired,

    /// Verification collaborator did not answer
    #[error("verification status unavailable")]
    VerificationUnavailable,

    /// Signaling or production action from a non-member
    #[error("not a participant of this session")]
    NotAParticipant,

    /// User is unknown to the profile store
    #[error("invalid user: {0}")]
    InvalidUser(String),

    #[error("stream not found: {0}")]
    StreamNotFound(String),

    /// Required stream configuration fields are missing
    #[error("invalid stream config: {0}")]
    InvalidConfig(String),
}

impl CoordinatorError {
    /// Stable wire code reported in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::BadRequest(_) => "bad_request",
            Self::UnknownMessageType(_) => "unknown_message_type",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidState(_) => "invalid_state",
            Self::VerificationRequired => "verification_required",
            Self::VerificationUnavailable => "verification_unavailable",
            Self::NotAParticipant => "not_a_participant",
            Self::InvalidUser(_) => "invalid_user",
            Self::StreamNotFound(_) => "stream_not_found",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl From<ValueError> for CoordinatorError {
    fn from(err: ValueError) -> Self {
        Self::BadRequest(err.to_string())
    }
}
