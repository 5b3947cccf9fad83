use axum::{
    extract::{Path, State},
    Json,
};

use super::agents::parse_variant;
use crate::api::errors::ApiError;
use crate::api::state::AppState;
use crate::domain::capture::CaptureDocument;

/// List the persisted records of a persona, oldest first
///
/// GET /api/records/:variant
pub async fn list_records(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<CaptureDocument>>, ApiError> {
    let variant = parse_variant(&name)?;
    let runtime = state
        .agent(variant)
        .ok_or_else(|| ApiError::not_found(format!("Agent not found: {}", name)))?;

    let documents = runtime
        .repository
        .find_all()
        .await
        .map_err(|e| ApiError::internal_server_error(format!("Failed to load records: {}", e)))?;

    Ok(Json(documents))
}
