//! Persistence seam between the engine and its backing tables.
//!
//! The processor and services only talk to [`WorkflowStore`]. Two backends
//! are provided:
//!
//! - [`PgStore`]: the production backend over the managed Postgres tables
//! - [`MemoryStore`]: an in-process backend for tests and local dry runs

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::db::models::{
    Contact, Enrollment, EnrollmentStatus, ExecutionStatus, NewEmailSend, NewEnrollment,
    NewStepExecution, Site, StepExecution, Workflow, WorkflowStep,
};
use crate::error::AppResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage operations used by the workflow processor and services.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Active enrollments with `next_run_at` unset or `<= now`, oldest first.
    async fn due_enrollments(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Enrollment>>;

    async fn enrollment(&self, enrollment_id: Uuid) -> AppResult<Option<Enrollment>>;

    async fn workflow(&self, workflow_id: Uuid) -> AppResult<Option<Workflow>>;

    /// Steps ordered by `step_order`.
    async fn workflow_steps(&self, workflow_id: Uuid) -> AppResult<Vec<WorkflowStep>>;

    async fn active_workflows_for_trigger(
        &self,
        site_id: Uuid,
        trigger_type: &str,
    ) -> AppResult<Vec<Workflow>>;

    async fn contact(&self, contact_id: Uuid) -> AppResult<Option<Contact>>;

    async fn site(&self, site_id: Uuid) -> AppResult<Option<Site>>;

    async fn set_contact_tags(&self, contact_id: Uuid, tags: &[String]) -> AppResult<()>;

    /// Latest execution recorded for (enrollment, step).
    async fn find_execution(
        &self,
        enrollment_id: Uuid,
        step_id: Uuid,
    ) -> AppResult<Option<StepExecution>>;

    async fn insert_execution(&self, new: &NewStepExecution) -> AppResult<StepExecution>;

    async fn update_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> AppResult<()>;

    async fn executions_for_enrollment(&self, enrollment_id: Uuid)
        -> AppResult<Vec<StepExecution>>;

    async fn insert_enrollment(&self, new: &NewEnrollment) -> AppResult<Enrollment>;

    async fn active_enrollment_exists(&self, workflow_id: Uuid, contact_id: Uuid)
        -> AppResult<bool>;

    /// Point the enrollment at `next_step_id` and schedule the next visit.
    async fn advance_enrollment(
        &self,
        enrollment_id: Uuid,
        next_step_id: Option<Uuid>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> AppResult<()>;

    /// Move an active enrollment to a terminal status.
    ///
    /// Returns `false` if the enrollment was not active.
    async fn finish_enrollment(
        &self,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        error: Option<&str>,
    ) -> AppResult<bool>;

    async fn enrollment_status_counts(&self, workflow_id: Uuid) -> AppResult<Vec<(String, i64)>>;

    async fn record_email_send(&self, send: &NewEmailSend) -> AppResult<Uuid>;
}
