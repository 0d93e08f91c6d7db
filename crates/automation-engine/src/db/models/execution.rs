//! Step execution model: the record that a workflow step ran for an enrollment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Step execution status values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// A wait step whose delay has not elapsed yet.
    Waiting,
    Completed,
    Failed,
    /// Step was evaluated but intentionally not performed.
    Skipped,
}

impl ExecutionStatus {
    /// Completed and skipped executions must never run again.
    pub fn is_settled(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Skipped)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Waiting => "waiting",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for ExecutionStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "waiting" | "pending" => ExecutionStatus::Waiting,
            "completed" => ExecutionStatus::Completed,
            "skipped" => ExecutionStatus::Skipped,
            _ => ExecutionStatus::Failed,
        }
    }
}

/// Database step execution record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StepExecution {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub step_id: Uuid,
    pub status: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub executed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StepExecution {
    pub fn status(&self) -> ExecutionStatus {
        ExecutionStatus::from(self.status.as_str())
    }

    /// Branch target recorded by a condition step, if any.
    pub fn recorded_next_step(&self) -> Option<Uuid> {
        self.result
            .as_ref()
            .and_then(|r| r.get("next_step_id"))
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// Request to create a step execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStepExecution {
    pub enrollment_id: Uuid,
    pub step_id: Uuid,
    pub status: ExecutionStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_settled_statuses() {
        assert!(ExecutionStatus::Completed.is_settled());
        assert!(ExecutionStatus::Skipped.is_settled());
        assert!(!ExecutionStatus::Waiting.is_settled());
        assert!(!ExecutionStatus::Failed.is_settled());
    }

    #[test]
    fn test_recorded_next_step() {
        let target = Uuid::new_v4();
        let now = Utc::now();
        let execution = StepExecution {
            id: Uuid::new_v4(),
            enrollment_id: Uuid::new_v4(),
            step_id: Uuid::new_v4(),
            status: "completed".to_string(),
            result: Some(json!({"matched": true, "next_step_id": target.to_string()})),
            error: None,
            scheduled_for: None,
            executed_at: now,
            created_at: now,
        };
        assert_eq!(execution.recorded_next_step(), Some(target));
    }
}
