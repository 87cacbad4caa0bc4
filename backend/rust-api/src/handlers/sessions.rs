use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::{
    extractors::AppJson,
    models::{GameResult, RewardChoice, SessionCommand, SessionView},
    services::AppState,
};

/// POST /api/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.sessions.create_session().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.sessions.view(&session_id).await?))
}

/// POST /api/sessions/{id}/commands
///
/// Commands that do not apply in the current phase leave the view unchanged.
pub async fn apply_command(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(command): AppJson<SessionCommand>,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.sessions.apply(&session_id, &command).await?))
}

/// POST /api/sessions/{id}/reward
pub async fn submit_reward(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(choice): AppJson<RewardChoice>,
) -> Result<Json<GameResult>, ApiError> {
    tracing::info!(
        "Submitting reward: session={}, gift_type={}",
        session_id,
        choice.kind.as_str()
    );

    let result = state
        .sessions
        .submit_reward(&session_id, choice, &state.results)
        .await?;
    Ok(Json(result))
}

/// DELETE /api/sessions/{id}
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.sessions.remove_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
