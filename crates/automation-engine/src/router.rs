//! Route table for the automation engine API.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the application router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::api_health));

    // Cron entry point, path kept compatible with the serverless deployment
    let process_routes = Router::new().route(
        "/functions/v1/process-workflows",
        post(handlers::process_workflows),
    );

    let workflow_routes = Router::new()
        .route(
            "/api/workflows/{id}/enroll",
            post(handlers::workflows::enroll),
        )
        .route("/api/workflows/{id}/stats", get(handlers::workflows::stats))
        .route("/api/triggers", post(handlers::triggers::fire));

    let enrollment_routes = Router::new()
        .route("/api/enrollments/{id}", get(handlers::enrollments::get))
        .route(
            "/api/enrollments/{id}/cancel",
            post(handlers::enrollments::cancel),
        );

    let database_routes = Router::new().route(
        "/api/db/validate",
        get(handlers::database::validate_database),
    );

    Router::new()
        .merge(health_routes)
        .merge(process_routes)
        .merge(workflow_routes)
        .merge(enrollment_routes)
        .merge(database_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::config::AppConfig;
    use crate::delivery::testing::{RecordingEmailSender, RecordingWebhookDispatcher};
    use crate::engine::{ProcessorConfig, WorkflowProcessor};
    use crate::store::MemoryStore;
    use crate::testing::Fixture;

    fn app(store: Arc<MemoryStore>, config: AppConfig) -> Router {
        let processor = Arc::new(WorkflowProcessor::new(
            store.clone(),
            Arc::new(RecordingEmailSender::default()),
            Arc::new(RecordingWebhookDispatcher::default()),
            ProcessorConfig::default(),
        ));
        build_router(AppState::new(store, processor, None, config))
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let store = Arc::new(MemoryStore::new());
        let (status, body) = send(app(store.clone(), AppConfig::default()), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(app(store, AppConfig::default()), "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"], "not_configured");
    }

    #[tokio::test]
    async fn test_enroll_process_and_inspect() {
        let store = Arc::new(MemoryStore::new());
        let fx = Fixture::new(&store).await;
        let wf = fx.workflow(vec![("add_tag", json!({"tag": "api"}))]).await;
        let router = app(store.clone(), AppConfig::default());

        let (status, enrollment) = send(
            router.clone(),
            "POST",
            &format!("/api/workflows/{}/enroll", wf),
            Some(json!({"contact_id": fx.contact_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let enrollment_id = enrollment["id"].as_str().unwrap().to_string();

        let (status, _) = send(
            router.clone(),
            "POST",
            &format!("/api/workflows/{}/enroll", wf),
            Some(json!({"contact_id": fx.contact_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, summary) =
            send(router.clone(), "POST", "/functions/v1/process-workflows", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(summary["success"], true);
        assert_eq!(summary["completed"], 1);

        let (status, history) = send(
            router.clone(),
            "GET",
            &format!("/api/enrollments/{}", enrollment_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(history["enrollment"]["status"], "completed");
        assert_eq!(history["executions"].as_array().unwrap().len(), 1);

        let (status, stats) =
            send(router, "GET", &format!("/api/workflows/{}/stats", wf), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total"], 1);
        assert_eq!(stats["completion_rate"], 100.0);
    }

    #[tokio::test]
    async fn test_process_requires_cron_secret() {
        let store = Arc::new(MemoryStore::new());
        let config = AppConfig {
            cron_secret: Some("s3cret".to_string()),
            ..AppConfig::default()
        };
        let router = app(store, config);

        let (status, body) =
            send(router.clone(), "POST", "/functions/v1/process-workflows", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], 401);

        let request = Request::builder()
            .method("POST")
            .uri("/functions/v1/process-workflows")
            .header("authorization", "Bearer s3cret")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_trigger_and_cancel() {
        let store = Arc::new(MemoryStore::new());
        let fx = Fixture::new(&store).await;
        fx.triggered_workflow("form_submitted", json!({"form_id": "newsletter"}), vec![])
            .await;
        let router = app(store.clone(), AppConfig::default());

        let (status, outcome) = send(
            router.clone(),
            "POST",
            "/api/triggers",
            Some(json!({
                "site_id": fx.site_id,
                "trigger_type": "form_submitted",
                "contact_id": fx.contact_id,
                "data": {"form_id": "newsletter"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let enrolled = outcome["enrolled"].as_array().unwrap();
        assert_eq!(enrolled.len(), 1);
        let id = enrolled[0]["id"].as_str().unwrap().to_string();

        let (status, cancelled) = send(
            router.clone(),
            "POST",
            &format!("/api/enrollments/{}/cancel", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "cancelled");

        let (status, _) = send(
            router,
            "POST",
            &format!("/api/enrollments/{}/cancel", id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let store = Arc::new(MemoryStore::new());
        let router = app(store, AppConfig::default());

        let (status, _) = send(
            router.clone(),
            "GET",
            &format!("/api/enrollments/{}", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(
            router,
            "GET",
            &format!("/api/workflows/{}/stats", Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validate_without_database() {
        let store = Arc::new(MemoryStore::new());
        let (status, _) = send(app(store, AppConfig::default()), "GET", "/api/db/validate", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
