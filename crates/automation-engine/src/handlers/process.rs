//! Cron entry point for a processing pass.

use std::time::Instant;

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::engine::ProcessSummary;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub success: bool,
    #[serde(flatten)]
    pub summary: ProcessSummary,
    pub duration_ms: u64,
}

/// Run one pass over due enrollments.
///
/// POST /functions/v1/process-workflows
///
/// When `cron_secret` is configured the request must carry
/// `Authorization: Bearer <cron_secret>`.
pub async fn process_workflows(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ProcessResponse>> {
    authorize(state.config.cron_secret.as_deref(), &headers)?;

    let started = Instant::now();
    let summary = state.processor.process_due(Utc::now()).await?;

    Ok(Json(ProcessResponse {
        success: true,
        summary,
        duration_ms: started.elapsed().as_millis() as u64,
    }))
}

fn authorize(secret: Option<&str>, headers: &HeaderMap) -> AppResult<()> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Ok(());
    };

    let provided = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match provided {
        Some(token) if token == secret => Ok(()),
        Some(_) => Err(AppError::Auth("Invalid cron secret".to_string())),
        None => Err(AppError::Auth("Missing bearer token".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_authorize() {
        let mut headers = HeaderMap::new();
        assert!(authorize(None, &headers).is_ok());
        assert!(authorize(Some(""), &headers).is_ok());
        assert!(matches!(authorize(Some("s3cret"), &headers), Err(AppError::Auth(_))));

        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(authorize(Some("s3cret"), &headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(authorize(Some("s3cret"), &headers).is_ok());
    }
}
