//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::db::pool::health_check as db_health_check;
use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Health status ("ok" or "unhealthy")
    pub status: String,
}

/// Detailed health check response for the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiHealthResponse {
    pub status: String,

    /// "connected", "disconnected" or "not_configured"
    pub database: String,

    pub uptime_seconds: u64,

    pub version: String,

    pub scheduler_enabled: bool,
}

/// Basic health check endpoint.
///
/// `GET /health`
pub async fn health_check() -> Json<HealthCheckResponse> {
    Json(HealthCheckResponse {
        status: "ok".to_string(),
    })
}

/// Detailed API health check endpoint.
///
/// `GET /api/health`
///
/// Returns `503 Service Unavailable` when a configured database is unreachable.
pub async fn api_health(State(state): State<AppState>) -> (StatusCode, Json<ApiHealthResponse>) {
    let database = match &state.db {
        Some(pool) if db_health_check(pool).await => "connected",
        Some(_) => "disconnected",
        None => "not_configured",
    };

    let (code, status) = if database == "disconnected" {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        code,
        Json(ApiHealthResponse {
            status: status.to_string(),
            database: database.to_string(),
            uptime_seconds: state.uptime_seconds(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            scheduler_enabled: state.config.scheduler_enabled,
        }),
    )
}
