//! Trigger event handler.

use axum::{extract::State, Json};

use crate::error::{AppError, AppResult};
use crate::services::{TriggerEvent, TriggerOutcome};
use crate::state::AppState;

/// Fire a trigger event for a contact.
///
/// POST /api/triggers
pub async fn fire(
    State(state): State<AppState>,
    Json(event): Json<TriggerEvent>,
) -> AppResult<Json<TriggerOutcome>> {
    if event.trigger_type.trim().is_empty() {
        return Err(AppError::BadRequest("trigger_type is required".to_string()));
    }
    Ok(Json(state.enrollments.trigger(&event).await?))
}
