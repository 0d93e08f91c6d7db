//! Database schema handlers.

use axum::{extract::State, Json};

use crate::db::schema::{validate_schema, SchemaReport};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Validate the database schema.
///
/// GET /api/db/validate
///
/// Checks that every required table exists in the configured schema.
pub async fn validate_database(State(state): State<AppState>) -> AppResult<Json<SchemaReport>> {
    let pool = state
        .db
        .as_ref()
        .ok_or_else(|| AppError::Config("No database configured".to_string()))?;

    let report = validate_schema(pool, &state.config.schema).await?;
    if !report.valid {
        tracing::warn!(schema = %report.schema, missing = ?report.missing, "Schema is missing tables");
    }
    Ok(Json(report))
}
