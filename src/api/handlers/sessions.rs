use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::agents::parse_variant;
use crate::agents::{Argument, CaptureSession, SessionSnapshot};
use crate::api::errors::ApiError;
use crate::api::state::AppState;
use crate::domain::capture::CaptureDocument;

/// Request body for starting a session
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub variant: String,
}

/// Request body for invoking an operation
#[derive(Debug, Default, Deserialize)]
pub struct OperationRequest {
    pub argument: Option<Argument>,
}

/// Response from an operation: what to say, and where the record stands
#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub confirmation: String,
    pub session: SessionSnapshot,
}

async fn find_session(state: &AppState, id: Uuid) -> Result<Arc<Mutex<CaptureSession>>, ApiError> {
    state
        .session(id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Session not found: {}", id)))
}

/// Start a capture session for a persona
///
/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionSnapshot>), ApiError> {
    let variant = parse_variant(&req.variant)?;
    let session = state
        .start_session(variant)
        .await
        .ok_or_else(|| ApiError::not_found(format!("Agent not found: {}", req.variant)))?;

    let snapshot = session.lock().await.snapshot();
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Get a session snapshot
///
/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    let snapshot = session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// Drop a session
///
/// DELETE /api/sessions/:id
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.remove_session(id).await {
        tracing::info!(session_id = %id, "Session closed");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("Session not found: {}", id)))
    }
}

/// Invoke a named operation on the session's record
///
/// POST /api/sessions/:id/operations/:operation
pub async fn invoke_operation(
    State(state): State<AppState>,
    Path((id, operation)): Path<(Uuid, String)>,
    body: Option<Json<OperationRequest>>,
) -> Result<Json<OperationResponse>, ApiError> {
    let session = find_session(&state, id).await?;
    let argument = body.and_then(|Json(req)| req.argument);

    let mut session = session.lock().await;
    let confirmation = session.invoke(&operation, argument).await?;

    Ok(Json(OperationResponse {
        confirmation,
        session: session.snapshot(),
    }))
}

/// Finalize the current record
///
/// POST /api/sessions/:id/finalize
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CaptureDocument>), ApiError> {
    let session = find_session(&state, id).await?;
    let document = session.lock().await.finalize().await?;
    Ok((StatusCode::CREATED, Json(document)))
}

/// Start a fresh record in the session
///
/// POST /api/sessions/:id/reset
pub async fn reset_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, id).await?;
    let mut session = session.lock().await;
    session.new_record();
    Ok(Json(session.snapshot()))
}

/// Stream the session's capture events
///
/// GET /api/sessions/:id/events
///
/// Each `partial_update` or `complete` event is sent as one SSE frame named
/// after its kind. The stream ends when the session is dropped.
pub async fn session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let session = find_session(&state, id).await?;
    let events = session.lock().await.subscribe();
    tracing::debug!(session_id = %id, "Event stream opened");

    let frames = stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        let frame = Event::default().event(event.kind()).json_data(&event);
        Some((frame, events))
    });

    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}
