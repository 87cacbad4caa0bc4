use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::metrics;
use crate::services::{
    game_results_service::GameResultError, session_service::SessionError, AppState,
};

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend = state.results.backend();

    let store_health = match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.results.health(),
    )
    .await
    {
        Ok(Ok(())) => json!({ "status": "healthy", "backend": backend }),
        Ok(Err(e)) => json!({
            "status": "unhealthy",
            "backend": backend,
            "error": format!("{:#}", e),
        }),
        Err(_) => json!({
            "status": "unhealthy",
            "backend": backend,
            "error": "Results store timeout after 1s",
        }),
    };

    let healthy = store_health.get("status").and_then(|v| v.as_str()) == Some("healthy");
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "birthday-challenge-api",
            "version": env!("CARGO_PKG_VERSION"),
            "activeSessions": state.sessions.active_count().await,
            "dependencies": { "results_store": store_health }
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Protects `/metrics` with HTTP Basic auth (`METRICS_AUTH=user:password`).
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let encoded = auth_header
        .strip_prefix("Basic ")
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;
    let credentials = String::from_utf8(decoded).map_err(|_| StatusCode::UNAUTHORIZED)?;

    let expected = std::env::var("METRICS_AUTH").unwrap_or_else(|_| "admin:changeme".to_string());

    if credentials != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(request).await)
}

/// Error returned by the API handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<GameResultError> for ApiError {
    fn from(err: GameResultError) -> Self {
        match err {
            GameResultError::Validation(message) => ApiError::BadRequest(message),
            storage @ GameResultError::Storage(_) => ApiError::Internal(storage.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ApiError::NotFound(err.to_string()),
            SessionError::Capacity(_) => ApiError::ServiceUnavailable(err.to_string()),
            SessionError::Engine(_) => ApiError::Conflict(err.to_string()),
            SessionError::Result(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::ServiceUnavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            ApiError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub mod game_results;
pub mod sessions;
pub mod sse;
