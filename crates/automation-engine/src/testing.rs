//! Seed data shared by unit tests.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::models::{Contact, Enrollment, NewEnrollment, Site, Workflow, WorkflowStep};
use crate::store::{MemoryStore, WorkflowStore};

/// A site with one contact (Ada Lovelace, tagged `vip` and `lead`).
pub struct Fixture<'a> {
    pub store: &'a MemoryStore,
    pub site_id: Uuid,
    pub contact_id: Uuid,
}

impl<'a> Fixture<'a> {
    pub async fn new(store: &'a MemoryStore) -> Fixture<'a> {
        let site_id = Uuid::new_v4();
        store
            .insert_site(Site {
                id: site_id,
                name: "Analytical Shop".to_string(),
                from_email: Some("hello@shop.test".to_string()),
                from_name: Some("Analytical Shop".to_string()),
            })
            .await;

        let contact = contact(site_id, "ada@example.com");
        let contact_id = contact.id;
        store.insert_contact(contact).await;

        Fixture {
            store,
            site_id,
            contact_id,
        }
    }

    /// Active manual workflow named "Welcome" with the given steps.
    pub async fn workflow(&self, steps: Vec<(&str, Value)>) -> Uuid {
        self.workflow_with_ids(steps).await.0
    }

    pub async fn workflow_with_ids(&self, steps: Vec<(&str, Value)>) -> (Uuid, Vec<Uuid>) {
        self.triggered_workflow("manual", json!({}), steps).await
    }

    pub async fn triggered_workflow(
        &self,
        trigger_type: &str,
        trigger_config: Value,
        steps: Vec<(&str, Value)>,
    ) -> (Uuid, Vec<Uuid>) {
        let now = Utc::now();
        let workflow = Workflow {
            id: Uuid::new_v4(),
            site_id: self.site_id,
            name: "Welcome".to_string(),
            status: "active".to_string(),
            trigger_type: trigger_type.to_string(),
            trigger_config,
            created_at: now,
            updated_at: now,
        };
        let workflow_id = workflow.id;

        let steps: Vec<WorkflowStep> = steps
            .into_iter()
            .enumerate()
            .map(|(i, (step_type, config))| WorkflowStep {
                id: Uuid::new_v4(),
                workflow_id,
                step_order: i as i32,
                step_type: step_type.to_string(),
                config,
                created_at: now,
            })
            .collect();
        let ids = steps.iter().map(|s| s.id).collect();

        self.store.insert_workflow(workflow, steps).await;
        (workflow_id, ids)
    }

    pub async fn set_step_config(&self, workflow_id: Uuid, step_id: Uuid, config: Value) {
        let workflow = self.store.workflow(workflow_id).await.unwrap().unwrap();
        let mut steps = self.store.workflow_steps(workflow_id).await.unwrap();
        for step in steps.iter_mut().filter(|s| s.id == step_id) {
            step.config = config.clone();
        }
        self.store.insert_workflow(workflow, steps).await;
    }

    pub async fn unsubscribe(&self) {
        let mut contact = self.store.contact(self.contact_id).await.unwrap().unwrap();
        contact.unsubscribed = true;
        self.store.insert_contact(contact).await;
    }

    pub async fn enroll(&self, workflow_id: Uuid) -> Enrollment {
        self.enroll_contact(workflow_id, self.contact_id).await
    }

    pub async fn enroll_contact(&self, workflow_id: Uuid, contact_id: Uuid) -> Enrollment {
        self.store
            .insert_enrollment(&NewEnrollment {
                workflow_id,
                contact_id,
                site_id: self.site_id,
                next_run_at: Utc::now() - Duration::seconds(1),
            })
            .await
            .unwrap()
    }
}

pub fn contact(site_id: Uuid, email: &str) -> Contact {
    Contact {
        id: Uuid::new_v4(),
        site_id,
        email: email.to_string(),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        tags: vec!["vip".to_string(), "lead".to_string()],
        custom_fields: json!({"plan": "pro"}),
        unsubscribed: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
