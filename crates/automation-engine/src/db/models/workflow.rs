//! Workflow and workflow step models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a workflow definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkflowStatus::Draft => "draft",
            WorkflowStatus::Active => "active",
            WorkflowStatus::Paused => "paused",
            WorkflowStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for WorkflowStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "active" => WorkflowStatus::Active,
            "paused" => WorkflowStatus::Paused,
            "archived" => WorkflowStatus::Archived,
            _ => WorkflowStatus::Draft,
        }
    }
}

/// Event that enrolls contacts into a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ContactCreated,
    TagAdded,
    FormSubmitted,
    PurchaseCompleted,
    Manual,
    Custom(String),
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriggerType::ContactCreated => "contact_created",
            TriggerType::TagAdded => "tag_added",
            TriggerType::FormSubmitted => "form_submitted",
            TriggerType::PurchaseCompleted => "purchase_completed",
            TriggerType::Manual => "manual",
            TriggerType::Custom(s) => s,
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for TriggerType {
    fn from(s: &str) -> Self {
        match s {
            "contact_created" => TriggerType::ContactCreated,
            "tag_added" => TriggerType::TagAdded,
            "form_submitted" => TriggerType::FormSubmitted,
            "purchase_completed" => TriggerType::PurchaseCompleted,
            "manual" => TriggerType::Manual,
            other => TriggerType::Custom(other.to_string()),
        }
    }
}

/// Workflow definition record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub site_id: Uuid,
    pub name: String,
    pub status: String,
    pub trigger_type: String,
    pub trigger_config: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn status(&self) -> WorkflowStatus {
        WorkflowStatus::from(self.status.as_str())
    }

    pub fn trigger(&self) -> TriggerType {
        TriggerType::from(self.trigger_type.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.status() == WorkflowStatus::Active
    }
}

/// One step of a workflow. Steps run in ascending `step_order`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub step_order: i32,
    pub step_type: String,
    pub config: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_status_roundtrip_strings() {
        assert_eq!(WorkflowStatus::from("ACTIVE"), WorkflowStatus::Active);
        assert_eq!(WorkflowStatus::from("paused"), WorkflowStatus::Paused);
        assert_eq!(WorkflowStatus::from("unknown"), WorkflowStatus::Draft);
        assert_eq!(WorkflowStatus::Archived.to_string(), "archived");
    }

    #[test]
    fn test_trigger_type_from_str() {
        assert_eq!(TriggerType::from("tag_added"), TriggerType::TagAdded);
        assert_eq!(
            TriggerType::from("webinar_registered"),
            TriggerType::Custom("webinar_registered".to_string())
        );
        assert_eq!(TriggerType::FormSubmitted.to_string(), "form_submitted");
    }
}
