//! Workflow enrollment and stats handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::Enrollment;
use crate::error::AppResult;
use crate::services::WorkflowStats;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct EnrollRequest {
    pub contact_id: Uuid,
}

/// Enroll a contact into a workflow.
///
/// POST /api/workflows/{id}/enroll
pub async fn enroll(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
    Json(request): Json<EnrollRequest>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    let enrollment = state
        .enrollments
        .enroll(workflow_id, request.contact_id)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

/// GET /api/workflows/{id}/stats
pub async fn stats(
    State(state): State<AppState>,
    Path(workflow_id): Path<Uuid>,
) -> AppResult<Json<WorkflowStats>> {
    Ok(Json(state.stats.workflow_stats(workflow_id).await?))
}
