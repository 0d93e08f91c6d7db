//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::db::models::{
    Contact, Enrollment, EnrollmentStatus, ExecutionStatus, NewEmailSend, NewEnrollment,
    NewStepExecution, Site, StepExecution, Workflow, WorkflowStep,
};
use crate::db::queries::{contact, email, enrollment, execution, workflow};
use crate::db::DbPool;
use crate::error::AppResult;

use super::WorkflowStore;

/// Store over the managed Postgres tables.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn due_enrollments(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Enrollment>> {
        enrollment::get_due_enrollments(&self.pool, now, limit).await
    }

    async fn enrollment(&self, enrollment_id: Uuid) -> AppResult<Option<Enrollment>> {
        enrollment::get_enrollment(&self.pool, enrollment_id).await
    }

    async fn workflow(&self, workflow_id: Uuid) -> AppResult<Option<Workflow>> {
        workflow::get_workflow(&self.pool, workflow_id).await
    }

    async fn workflow_steps(&self, workflow_id: Uuid) -> AppResult<Vec<WorkflowStep>> {
        workflow::get_workflow_steps(&self.pool, workflow_id).await
    }

    async fn active_workflows_for_trigger(
        &self,
        site_id: Uuid,
        trigger_type: &str,
    ) -> AppResult<Vec<Workflow>> {
        workflow::get_active_workflows_for_trigger(&self.pool, site_id, trigger_type).await
    }

    async fn contact(&self, contact_id: Uuid) -> AppResult<Option<Contact>> {
        contact::get_contact(&self.pool, contact_id).await
    }

    async fn site(&self, site_id: Uuid) -> AppResult<Option<Site>> {
        contact::get_site(&self.pool, site_id).await
    }

    async fn set_contact_tags(&self, contact_id: Uuid, tags: &[String]) -> AppResult<()> {
        contact::set_contact_tags(&self.pool, contact_id, tags).await
    }

    async fn find_execution(
        &self,
        enrollment_id: Uuid,
        step_id: Uuid,
    ) -> AppResult<Option<StepExecution>> {
        execution::find_execution(&self.pool, enrollment_id, step_id).await
    }

    async fn insert_execution(&self, new: &NewStepExecution) -> AppResult<StepExecution> {
        execution::insert_execution(&self.pool, new).await
    }

    async fn update_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> AppResult<()> {
        execution::update_execution(&self.pool, execution_id, status, result, error).await
    }

    async fn executions_for_enrollment(
        &self,
        enrollment_id: Uuid,
    ) -> AppResult<Vec<StepExecution>> {
        execution::get_executions_for_enrollment(&self.pool, enrollment_id).await
    }

    async fn insert_enrollment(&self, new: &NewEnrollment) -> AppResult<Enrollment> {
        enrollment::insert_enrollment(&self.pool, new).await
    }

    async fn active_enrollment_exists(
        &self,
        workflow_id: Uuid,
        contact_id: Uuid,
    ) -> AppResult<bool> {
        enrollment::has_active_enrollment(&self.pool, workflow_id, contact_id).await
    }

    async fn advance_enrollment(
        &self,
        enrollment_id: Uuid,
        next_step_id: Option<Uuid>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        enrollment::advance_enrollment(&self.pool, enrollment_id, next_step_id, next_run_at).await
    }

    async fn finish_enrollment(
        &self,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        error: Option<&str>,
    ) -> AppResult<bool> {
        enrollment::finish_enrollment(&self.pool, enrollment_id, status, error).await
    }

    async fn enrollment_status_counts(&self, workflow_id: Uuid) -> AppResult<Vec<(String, i64)>> {
        enrollment::count_by_status(&self.pool, workflow_id).await
    }

    async fn record_email_send(&self, send: &NewEmailSend) -> AppResult<Uuid> {
        email::insert_email_send(&self.pool, send).await
    }
}
