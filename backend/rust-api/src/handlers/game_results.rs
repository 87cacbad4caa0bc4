use axum::{extract::State, Json};
use std::sync::Arc;

use super::ApiError;
use crate::{
    extractors::AppJson,
    models::{GameResult, NewGameResult},
    services::AppState,
};

/// POST /api/game-results
pub async fn create_game_result(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<NewGameResult>,
) -> Result<Json<GameResult>, ApiError> {
    tracing::info!(
        player_name = %payload.player_name,
        gift_type = payload.gift_type.as_str(),
        "Recording game result"
    );

    let result = state.results.create(payload).await?;
    Ok(Json(result))
}

/// GET /api/game-results
pub async fn list_game_results(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<GameResult>>, ApiError> {
    let results = state.results.list().await?;
    Ok(Json(results))
}
