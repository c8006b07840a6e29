//! HTTP API response DTOs.

use serde::{Deserialize, Serialize};

use crate::domain::{SessionAnalytics, SessionStatus};

use super::websocket::ParticipantDto;

/// One row in the session listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummaryDto {
    pub id: String,
    pub title: String,
    pub host_id: String,
    pub status: SessionStatus,
    pub participant_count: usize,
    pub current_viewers: u64,
    pub created_at: String,
}

/// Full session detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDetailDto {
    pub id: String,
    pub title: String,
    pub host_id: String,
    pub status: SessionStatus,
    pub participants: Vec<ParticipantDto>,
    pub analytics: SessionAnalytics,
    pub created_at: String,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}
