//! Trait seams for external collaborators.
//!
//! The coordinator consumes these services through narrow interfaces;
//! their internals (KYC decisioning, profile storage, durable persistence)
//! live elsewhere. Concrete implementations are provided by the
//! infrastructure layer; tests use mockall automocks.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::value_object::UserId;

/// Identity-verification decisioning, consumed as a yes/no query.
///
/// Authoritative and re-queried at every co-star join attempt; results
/// are never cached across sessions.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// Whether the user has passed identity verification.
    ///
    /// `Err` means the collaborator could not answer; callers surface it
    /// as `VerificationUnavailable`, never hang.
    async fn verification_status(&self, user_id: &UserId) -> Result<bool, String>;
}

/// Minimal profile record used to enrich join confirmations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub role: String,
}

/// User/profile store lookup.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` means the user does not exist (a hard `InvalidUser`
    /// failure at authentication time).
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>, String>;
}

/// Durable highlight fact recorded at the moment of capture.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightRecord {
    pub stream_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub kind: String,
    pub score: f64,
}

/// Persistence for durable facts.
///
/// Fire-and-forget: failures are logged and swallowed; they never roll
/// back in-memory session state.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn create_highlight(&self, highlight: HighlightRecord) -> Result<(), String>;

    async fn update_stream_settings(
        &self,
        stream_id: &str,
        settings: serde_json::Value,
    ) -> Result<(), String>;
}
