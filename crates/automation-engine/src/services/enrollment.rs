//! Enrollment management service.
//!
//! Enrolls contacts into workflows (directly or by trigger event),
//! cancels enrollments and reports their execution history.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::db::models::{
    Contact, Enrollment, EnrollmentStatus, NewEnrollment, StepExecution, TriggerType, Workflow,
};
use crate::error::{AppError, AppResult};
use crate::store::WorkflowStore;

/// An event that may enroll a contact into workflows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub site_id: Uuid,
    pub trigger_type: String,
    pub contact_id: Uuid,
    #[serde(default)]
    pub data: Value,
}

/// Result of firing a trigger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub enrolled: Vec<Enrollment>,
    /// Workflows where the contact already had an active enrollment.
    pub already_enrolled: Vec<Uuid>,
}

/// An enrollment with every step execution recorded for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentHistory {
    pub enrollment: Enrollment,
    pub workflow_name: Option<String>,
    pub executions: Vec<StepExecution>,
}

/// Enrollment management service.
#[derive(Clone)]
pub struct EnrollmentService {
    store: Arc<dyn WorkflowStore>,
}

impl EnrollmentService {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Enroll a contact into an active workflow of the same site.
    pub async fn enroll(&self, workflow_id: Uuid, contact_id: Uuid) -> AppResult<Enrollment> {
        let workflow = self
            .store
            .workflow(workflow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Workflow not found: {}", workflow_id)))?;

        if !workflow.is_active() {
            return Err(AppError::Validation(format!(
                "Workflow {} is {}, only active workflows accept enrollments",
                workflow_id, workflow.status
            )));
        }

        let contact = self.site_contact(workflow.site_id, contact_id).await?;

        if self
            .store
            .active_enrollment_exists(workflow.id, contact.id)
            .await?
        {
            return Err(AppError::Conflict(format!(
                "Contact {} already has an active enrollment in workflow {}",
                contact.id, workflow.id
            )));
        }

        self.insert(&workflow, &contact).await
    }

    /// Enroll a contact into every active workflow of the site whose
    /// trigger matches the event.
    pub async fn trigger(&self, event: &TriggerEvent) -> AppResult<TriggerOutcome> {
        let contact = self.site_contact(event.site_id, event.contact_id).await?;
        let workflows = self
            .store
            .active_workflows_for_trigger(event.site_id, &event.trigger_type)
            .await?;

        let mut outcome = TriggerOutcome::default();

        for workflow in workflows
            .iter()
            .filter(|w| trigger_matches(w, &event.data))
        {
            if self
                .store
                .active_enrollment_exists(workflow.id, contact.id)
                .await?
            {
                outcome.already_enrolled.push(workflow.id);
                continue;
            }

            match self.insert(workflow, &contact).await {
                Ok(enrollment) => outcome.enrolled.push(enrollment),
                // Lost a race with a concurrent trigger.
                Err(AppError::Conflict(_)) => outcome.already_enrolled.push(workflow.id),
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            site_id = %event.site_id,
            trigger_type = %event.trigger_type,
            contact_id = %contact.id,
            enrolled = outcome.enrolled.len(),
            already_enrolled = outcome.already_enrolled.len(),
            "Trigger processed"
        );

        Ok(outcome)
    }

    /// Cancel an active enrollment.
    pub async fn cancel(&self, enrollment_id: Uuid) -> AppResult<Enrollment> {
        let enrollment = self.get(enrollment_id).await?;

        if enrollment.status().is_terminal() {
            return Err(AppError::Conflict(format!(
                "Enrollment {} is already {}",
                enrollment_id, enrollment.status
            )));
        }

        let cancelled = self
            .store
            .finish_enrollment(enrollment_id, EnrollmentStatus::Cancelled, None)
            .await?;
        if !cancelled {
            return Err(AppError::Conflict(format!(
                "Enrollment {} finished before it could be cancelled",
                enrollment_id
            )));
        }

        tracing::info!(enrollment_id = %enrollment_id, "Enrollment cancelled");
        self.get(enrollment_id).await
    }

    /// Enrollment plus its step executions in execution order.
    pub async fn history(&self, enrollment_id: Uuid) -> AppResult<EnrollmentHistory> {
        let enrollment = self.get(enrollment_id).await?;
        let workflow_name = self
            .store
            .workflow(enrollment.workflow_id)
            .await?
            .map(|w| w.name);
        let executions = self.store.executions_for_enrollment(enrollment_id).await?;

        Ok(EnrollmentHistory {
            enrollment,
            workflow_name,
            executions,
        })
    }

    async fn get(&self, enrollment_id: Uuid) -> AppResult<Enrollment> {
        self.store
            .enrollment(enrollment_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Enrollment not found: {}", enrollment_id)))
    }

    async fn site_contact(&self, site_id: Uuid, contact_id: Uuid) -> AppResult<Contact> {
        let contact = self
            .store
            .contact(contact_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Contact not found: {}", contact_id)))?;

        if contact.site_id != site_id {
            return Err(AppError::Validation(format!(
                "Contact {} does not belong to site {}",
                contact_id, site_id
            )));
        }
        Ok(contact)
    }

    async fn insert(&self, workflow: &Workflow, contact: &Contact) -> AppResult<Enrollment> {
        let enrollment = self
            .store
            .insert_enrollment(&NewEnrollment {
                workflow_id: workflow.id,
                contact_id: contact.id,
                site_id: workflow.site_id,
                next_run_at: Utc::now(),
            })
            .await?;

        tracing::info!(
            enrollment_id = %enrollment.id,
            workflow_id = %workflow.id,
            contact_id = %contact.id,
            "Contact enrolled"
        );
        Ok(enrollment)
    }
}

/// Whether a workflow's trigger config accepts the event data.
pub fn trigger_matches(workflow: &Workflow, data: &Value) -> bool {
    let config = &workflow.trigger_config;

    match workflow.trigger() {
        TriggerType::ContactCreated => true,
        TriggerType::TagAdded => match (text(config.get("tag")), text(data.get("tag"))) {
            (Some(want), Some(got)) => want.eq_ignore_ascii_case(&got),
            _ => false,
        },
        TriggerType::FormSubmitted => optional_filter(config, data, "form_id"),
        TriggerType::PurchaseCompleted => optional_filter(config, data, "product_id"),
        TriggerType::Manual => false,
        // Every configured key must be echoed by the event.
        TriggerType::Custom(_) => match config.as_object() {
            Some(map) => map
                .iter()
                .all(|(key, want)| text(Some(want)) == text(data.get(key))),
            None => true,
        },
    }
}

/// Unset or blank filters match everything.
fn optional_filter(config: &Value, data: &Value, key: &str) -> bool {
    match text(config.get(key)) {
        None => true,
        Some(want) => text(data.get(key)).as_deref() == Some(want.as_str()),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Null => return None,
        other => other.to_string(),
    };
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{contact, Fixture};
    use serde_json::json;

    fn workflow(trigger_type: &str, trigger_config: Value) -> Workflow {
        Workflow {
            id: Uuid::new_v4(),
            site_id: Uuid::new_v4(),
            name: "w".to_string(),
            status: "active".to_string(),
            trigger_type: trigger_type.to_string(),
            trigger_config,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_trigger_matching() {
        assert!(trigger_matches(&workflow("contact_created", json!({})), &json!({})));
        assert!(!trigger_matches(&workflow("manual", json!({})), &json!({})));

        let tagged = workflow("tag_added", json!({"tag": "VIP"}));
        assert!(trigger_matches(&tagged, &json!({"tag": "vip"})));
        assert!(!trigger_matches(&tagged, &json!({"tag": "lead"})));
        assert!(!trigger_matches(&workflow("tag_added", json!({})), &json!({"tag": "vip"})));

        let any_form = workflow("form_submitted", json!({"form_id": ""}));
        assert!(trigger_matches(&any_form, &json!({"form_id": "f1"})));
        let one_form = workflow("form_submitted", json!({"form_id": "f1"}));
        assert!(trigger_matches(&one_form, &json!({"form_id": "f1"})));
        assert!(!trigger_matches(&one_form, &json!({"form_id": "f2"})));
        assert!(!trigger_matches(&one_form, &json!({})));

        let product = workflow("purchase_completed", json!({"product_id": 42}));
        assert!(trigger_matches(&product, &json!({"product_id": "42"})));
    }

    #[test]
    fn test_custom_trigger_requires_every_configured_key() {
        let custom = workflow("webinar_joined", json!({"webinar": "launch", "tier": 2}));
        assert!(trigger_matches(&custom, &json!({"webinar": "launch", "tier": "2", "extra": true})));
        assert!(!trigger_matches(&custom, &json!({"webinar": "launch"})));
        assert!(!trigger_matches(&custom, &json!({"webinar": "other", "tier": 2})));

        assert!(trigger_matches(&workflow("webinar_joined", json!({})), &json!({"any": 1})));
        assert!(trigger_matches(&workflow("webinar_joined", Value::Null), &json!({})));
    }

    #[tokio::test]
    async fn test_enroll_and_conflict() {
        let store = Arc::new(MemoryStore::new());
        let fx = Fixture::new(&store).await;
        let wf = fx.workflow(vec![("add_tag", json!({"tag": "x"}))]).await;
        let service = EnrollmentService::new(store.clone());

        let enrollment = service.enroll(wf, fx.contact_id).await.unwrap();
        assert_eq!(enrollment.status(), EnrollmentStatus::Active);
        assert!(enrollment.next_run_at.is_some());

        let err = service.enroll(wf, fx.contact_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_enroll_rejects_inactive_and_foreign_contacts() {
        let store = Arc::new(MemoryStore::new());
        let fx = Fixture::new(&store).await;
        let wf = fx.workflow(vec![]).await;
        let service = EnrollmentService::new(store.clone());

        let outsider = contact(Uuid::new_v4(), "eve@example.com");
        let outsider_id = outsider.id;
        store.insert_contact(outsider).await;
        let err = service.enroll(wf, outsider_id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        store.set_workflow_status(wf, "draft").await;
        let err = service.enroll(wf, fx.contact_id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = service.enroll(Uuid::new_v4(), fx.contact_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_trigger_enrolls_matching_workflows_once() {
        let store = Arc::new(MemoryStore::new());
        let fx = Fixture::new(&store).await;
        let (vip, _) = fx
            .triggered_workflow("tag_added", json!({"tag": "vip"}), vec![])
            .await;
        fx.triggered_workflow("tag_added", json!({"tag": "churned"}), vec![])
            .await;
        fx.triggered_workflow("contact_created", json!({}), vec![]).await;
        let service = EnrollmentService::new(store.clone());

        let event = TriggerEvent {
            site_id: fx.site_id,
            trigger_type: "tag_added".to_string(),
            contact_id: fx.contact_id,
            data: json!({"tag": "vip"}),
        };

        let first = service.trigger(&event).await.unwrap();
        assert_eq!(first.enrolled.len(), 1);
        assert_eq!(first.enrolled[0].workflow_id, vip);

        let second = service.trigger(&event).await.unwrap();
        assert!(second.enrolled.is_empty());
        assert_eq!(second.already_enrolled, vec![vip]);
    }

    #[tokio::test]
    async fn test_cancel_and_history() {
        let store = Arc::new(MemoryStore::new());
        let fx = Fixture::new(&store).await;
        let wf = fx.workflow(vec![]).await;
        let service = EnrollmentService::new(store.clone());
        let enrollment = service.enroll(wf, fx.contact_id).await.unwrap();

        let cancelled = service.cancel(enrollment.id).await.unwrap();
        assert_eq!(cancelled.status(), EnrollmentStatus::Cancelled);

        let err = service.cancel(enrollment.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let history = service.history(enrollment.id).await.unwrap();
        assert_eq!(history.workflow_name.as_deref(), Some("Welcome"));
        assert!(history.executions.is_empty());

        // Cancelled enrollments free the slot for a new one.
        assert!(service.enroll(wf, fx.contact_id).await.is_ok());
    }
}
