//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use costream_shared::time::millis_to_rfc3339;

use crate::domain::SessionId;
use crate::infrastructure::dto::http::{SessionDetailDto, SessionSummaryDto};
use crate::infrastructure::dto::websocket::ParticipantDto;
use crate::ui::state::AppState;

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// List all sessions the coordinator currently holds.
pub async fn get_sessions(State(state): State<Arc<AppState>>) -> Json<Vec<SessionSummaryDto>> {
    let mut summaries = Vec::new();
    for handle in state.store.all().await {
        let session = handle.lock().await;
        summaries.push(SessionSummaryDto {
            id: session.id.to_string(),
            title: session.title.clone(),
            host_id: session.host_id.to_string(),
            status: session.status,
            participant_count: session.participants.len(),
            current_viewers: session.analytics.current_viewers,
            created_at: millis_to_rfc3339(session.created_at.value()),
        });
    }
    summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(summaries)
}

/// Get one session by id.
pub async fn get_session_detail(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailDto>, StatusCode> {
    let id = SessionId::parse(&session_id).map_err(|_| StatusCode::BAD_REQUEST)?;
    let handle = state.store.get(&id).await.ok_or(StatusCode::NOT_FOUND)?;

    let session = handle.lock().await;
    let mut participants: Vec<ParticipantDto> =
        session.participants.values().map(ParticipantDto::from).collect();
    participants.sort_by(|a, b| a.user_id.cmp(&b.user_id));

    Ok(Json(SessionDetailDto {
        id: session.id.to_string(),
        title: session.title.clone(),
        host_id: session.host_id.to_string(),
        status: session.status,
        participants,
        analytics: session.analytics.clone(),
        created_at: millis_to_rfc3339(session.created_at.value()),
        started_at: session.started_at.map(|t| millis_to_rfc3339(t.value())),
        ended_at: session.ended_at.map(|t| millis_to_rfc3339(t.value())),
    }))
}
