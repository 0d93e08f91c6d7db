//! Application state shared by the HTTP handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::engine::WorkflowProcessor;
use crate::services::{EnrollmentService, StatsService};
use crate::store::WorkflowStore;

/// Shared application state.
///
/// Cloned into every handler via Axum's state; all members are cheap
/// handles.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn WorkflowStore>,

    pub processor: Arc<WorkflowProcessor>,

    pub enrollments: EnrollmentService,

    pub stats: StatsService,

    /// Postgres pool; `None` when running on the in-memory store.
    pub db: Option<DbPool>,

    pub config: Arc<AppConfig>,

    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        processor: Arc<WorkflowProcessor>,
        db: Option<DbPool>,
        config: AppConfig,
    ) -> Self {
        Self {
            enrollments: EnrollmentService::new(store.clone()),
            stats: StatsService::new(store.clone()),
            store,
            processor,
            db,
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the server uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn has_database(&self) -> bool {
        self.db.is_some()
    }
}
