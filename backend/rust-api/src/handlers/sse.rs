use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::{error::RecvError, Receiver};

use super::ApiError;
use crate::{metrics::SSE_CONNECTIONS_ACTIVE, models::timer::SessionEvent, services::AppState};

/// SSE endpoint for session events
/// GET /api/sessions/{id}/stream
pub async fn session_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let receiver = state.sessions.subscribe(&session_id).await?;
    tracing::info!("Client connected to SSE stream: session={}", session_id);

    let stream = create_event_stream(session_id, receiver);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Keeps the connection gauge accurate however the stream ends.
struct ConnectionGuard {
    session_id: String,
}

impl ConnectionGuard {
    fn new(session_id: String) -> Self {
        SSE_CONNECTIONS_ACTIVE.inc();
        Self { session_id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        SSE_CONNECTIONS_ACTIVE.dec();
        tracing::info!("SSE stream closed: session={}", self.session_id);
    }
}

/// Forwards session events until the session is torn down.
fn create_event_stream(
    session_id: String,
    receiver: Receiver<SessionEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    let guard = ConnectionGuard::new(session_id);

    stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        match receiver.recv().await {
            Ok(event) => {
                let sse = Event::default()
                    .event(event.event_name())
                    .data(event.to_sse_data());
                Some((Ok(sse), (receiver, guard)))
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "SSE client lagging: session={}, skipped={}",
                    guard.session_id,
                    skipped
                );
                let notice = Event::default().comment(format!("skipped {} events", skipped));
                Some((Ok(notice), (receiver, guard)))
            }
            Err(RecvError::Closed) => None,
        }
    })
}
