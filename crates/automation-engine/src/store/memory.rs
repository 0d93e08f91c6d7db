//! In-memory store for tests and local dry runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{
    Contact, Enrollment, EnrollmentStatus, ExecutionStatus, NewEmailSend, NewEnrollment,
    NewStepExecution, Site, StepExecution, Workflow, WorkflowStep,
};
use crate::error::{AppError, AppResult};

use super::WorkflowStore;

#[derive(Default)]
struct Tables {
    sites: HashMap<Uuid, Site>,
    contacts: HashMap<Uuid, Contact>,
    workflows: HashMap<Uuid, Workflow>,
    steps: Vec<WorkflowStep>,
    enrollments: Vec<Enrollment>,
    executions: Vec<StepExecution>,
    email_sends: Vec<NewEmailSend>,
}

/// Store holding every table in process memory.
///
/// Rows keep insertion order, so "latest" lookups return the most
/// recently inserted match.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_site(&self, site: Site) {
        self.tables.write().await.sites.insert(site.id, site);
    }

    pub async fn insert_contact(&self, contact: Contact) {
        self.tables.write().await.contacts.insert(contact.id, contact);
    }

    /// Insert a workflow together with its steps.
    pub async fn insert_workflow(&self, workflow: Workflow, steps: Vec<WorkflowStep>) {
        let mut tables = self.tables.write().await;
        tables.steps.retain(|s| s.workflow_id != workflow.id);
        tables.steps.extend(steps);
        tables.workflows.insert(workflow.id, workflow);
    }

    pub async fn set_workflow_status(&self, workflow_id: Uuid, status: &str) {
        if let Some(workflow) = self.tables.write().await.workflows.get_mut(&workflow_id) {
            workflow.status = status.to_string();
        }
    }

    /// Snapshot of every recorded email send.
    pub async fn email_sends(&self) -> Vec<NewEmailSend> {
        self.tables.read().await.email_sends.clone()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn due_enrollments(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<Enrollment>> {
        let tables = self.tables.read().await;
        let mut due: Vec<Enrollment> = tables
            .enrollments
            .iter()
            .filter(|e| e.is_due(now))
            .filter(|e| {
                tables
                    .workflows
                    .get(&e.workflow_id)
                    .map_or(true, |w| w.is_active())
            })
            .cloned()
            .collect();

        // NULLS FIRST, then oldest schedule, then oldest enrollment.
        due.sort_by_key(|e| (e.next_run_at.is_some(), e.next_run_at, e.enrolled_at));
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn enrollment(&self, enrollment_id: Uuid) -> AppResult<Option<Enrollment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .enrollments
            .iter()
            .find(|e| e.id == enrollment_id)
            .cloned())
    }

    async fn workflow(&self, workflow_id: Uuid) -> AppResult<Option<Workflow>> {
        Ok(self.tables.read().await.workflows.get(&workflow_id).cloned())
    }

    async fn workflow_steps(&self, workflow_id: Uuid) -> AppResult<Vec<WorkflowStep>> {
        let tables = self.tables.read().await;
        let mut steps: Vec<WorkflowStep> = tables
            .steps
            .iter()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.step_order, s.created_at));
        Ok(steps)
    }

    async fn active_workflows_for_trigger(
        &self,
        site_id: Uuid,
        trigger_type: &str,
    ) -> AppResult<Vec<Workflow>> {
        let tables = self.tables.read().await;
        let mut workflows: Vec<Workflow> = tables
            .workflows
            .values()
            .filter(|w| w.site_id == site_id && w.trigger_type == trigger_type && w.is_active())
            .cloned()
            .collect();
        workflows.sort_by_key(|w| w.created_at);
        Ok(workflows)
    }

    async fn contact(&self, contact_id: Uuid) -> AppResult<Option<Contact>> {
        Ok(self.tables.read().await.contacts.get(&contact_id).cloned())
    }

    async fn site(&self, site_id: Uuid) -> AppResult<Option<Site>> {
        Ok(self.tables.read().await.sites.get(&site_id).cloned())
    }

    async fn set_contact_tags(&self, contact_id: Uuid, tags: &[String]) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let contact = tables
            .contacts
            .get_mut(&contact_id)
            .ok_or_else(|| AppError::NotFound(format!("Contact not found: {}", contact_id)))?;
        contact.tags = tags.to_vec();
        contact.updated_at = Utc::now();
        Ok(())
    }

    async fn find_execution(
        &self,
        enrollment_id: Uuid,
        step_id: Uuid,
    ) -> AppResult<Option<StepExecution>> {
        let tables = self.tables.read().await;
        Ok(tables
            .executions
            .iter()
            .rev()
            .find(|x| x.enrollment_id == enrollment_id && x.step_id == step_id)
            .cloned())
    }

    async fn insert_execution(&self, new: &NewStepExecution) -> AppResult<StepExecution> {
        let now = Utc::now();
        let execution = StepExecution {
            id: Uuid::new_v4(),
            enrollment_id: new.enrollment_id,
            step_id: new.step_id,
            status: new.status.to_string(),
            result: new.result.clone(),
            error: new.error.clone(),
            scheduled_for: new.scheduled_for,
            executed_at: now,
            created_at: now,
        };
        self.tables.write().await.executions.push(execution.clone());
        Ok(execution)
    }

    async fn update_execution(
        &self,
        execution_id: Uuid,
        status: ExecutionStatus,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        let execution = tables
            .executions
            .iter_mut()
            .find(|x| x.id == execution_id)
            .ok_or_else(|| AppError::NotFound(format!("Execution not found: {}", execution_id)))?;

        execution.status = status.to_string();
        if let Some(result) = result {
            execution.result = Some(result.clone());
        }
        execution.error = error.map(str::to_string);
        execution.executed_at = Utc::now();
        Ok(())
    }

    async fn executions_for_enrollment(
        &self,
        enrollment_id: Uuid,
    ) -> AppResult<Vec<StepExecution>> {
        let tables = self.tables.read().await;
        Ok(tables
            .executions
            .iter()
            .filter(|x| x.enrollment_id == enrollment_id)
            .cloned()
            .collect())
    }

    async fn insert_enrollment(&self, new: &NewEnrollment) -> AppResult<Enrollment> {
        let mut tables = self.tables.write().await;

        // Mirrors the partial unique index on (workflow_id, contact_id).
        if tables.enrollments.iter().any(|e| {
            e.workflow_id == new.workflow_id
                && e.contact_id == new.contact_id
                && e.status() == EnrollmentStatus::Active
        }) {
            return Err(AppError::Conflict(format!(
                "Contact {} already has an active enrollment in workflow {}",
                new.contact_id, new.workflow_id
            )));
        }

        let now = Utc::now();
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            workflow_id: new.workflow_id,
            contact_id: new.contact_id,
            site_id: new.site_id,
            status: EnrollmentStatus::Active.to_string(),
            current_step_id: None,
            next_run_at: Some(new.next_run_at),
            enrolled_at: now,
            completed_at: None,
            last_error: None,
            updated_at: now,
        };
        tables.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn active_enrollment_exists(
        &self,
        workflow_id: Uuid,
        contact_id: Uuid,
    ) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.enrollments.iter().any(|e| {
            e.workflow_id == workflow_id
                && e.contact_id == contact_id
                && e.status() == EnrollmentStatus::Active
        }))
    }

    async fn advance_enrollment(
        &self,
        enrollment_id: Uuid,
        next_step_id: Option<Uuid>,
        next_run_at: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(enrollment) = tables
            .enrollments
            .iter_mut()
            .find(|e| e.id == enrollment_id && e.status() == EnrollmentStatus::Active)
        {
            enrollment.current_step_id = next_step_id;
            enrollment.next_run_at = next_run_at;
            enrollment.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn finish_enrollment(
        &self,
        enrollment_id: Uuid,
        status: EnrollmentStatus,
        error: Option<&str>,
    ) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables
            .enrollments
            .iter_mut()
            .find(|e| e.id == enrollment_id && e.status() == EnrollmentStatus::Active)
        {
            Some(enrollment) => {
                let now = Utc::now();
                enrollment.status = status.to_string();
                enrollment.last_error = error.map(str::to_string);
                enrollment.completed_at = Some(now);
                enrollment.next_run_at = None;
                enrollment.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn enrollment_status_counts(&self, workflow_id: Uuid) -> AppResult<Vec<(String, i64)>> {
        let tables = self.tables.read().await;
        let mut counts: HashMap<String, i64> = HashMap::new();
        for enrollment in tables.enrollments.iter().filter(|e| e.workflow_id == workflow_id) {
            *counts.entry(enrollment.status.clone()).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn record_email_send(&self, send: &NewEmailSend) -> AppResult<Uuid> {
        self.tables.write().await.email_sends.push(send.clone());
        Ok(Uuid::new_v4())
    }
}
