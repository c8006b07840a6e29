//! Domain layer for the co-streaming coordinator.
//!
//! Pure session state and business rules: value objects, the session
//! entity with its lifecycle state machine, the coordinator error
//! taxonomy, and the trait seams for external collaborators.

mod collaborator;
mod error;
mod session;
mod value_object;

pub use collaborator::{DurableStore, HighlightRecord, UserDirectory, UserProfile, VerificationService};
#[cfg(test)]
pub use collaborator::{MockDurableStore, MockUserDirectory, MockVerificationService};
pub use error::CoordinatorError;
pub use session::{
    ChatMessage, ChatMessageKind, ModerationAction, Participant, ParticipantRole, Session,
    SessionAnalytics, SessionStatus, Viewer,
};
pub use value_object::{MessageBody, SessionId, Timestamp, UserId, ValueError};
