//! Enrollment inspection and cancellation handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::db::models::Enrollment;
use crate::error::AppResult;
use crate::services::EnrollmentHistory;
use crate::state::AppState;

/// Get an enrollment with its execution history.
///
/// GET /api/enrollments/{id}
pub async fn get(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<EnrollmentHistory>> {
    Ok(Json(state.enrollments.history(enrollment_id).await?))
}

/// Cancel an active enrollment.
///
/// POST /api/enrollments/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    Ok(Json(state.enrollments.cancel(enrollment_id).await?))
}
