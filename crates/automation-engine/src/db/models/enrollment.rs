//! Workflow enrollment model: a contact's progress pointer through a workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Enrollment status values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Failed,
    Cancelled,
}

impl EnrollmentStatus {
    pub const ALL: [EnrollmentStatus; 4] = [
        EnrollmentStatus::Active,
        EnrollmentStatus::Completed,
        EnrollmentStatus::Failed,
        EnrollmentStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        !matches!(self, EnrollmentStatus::Active)
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Failed => "failed",
            EnrollmentStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl From<&str> for EnrollmentStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "completed" => EnrollmentStatus::Completed,
            "failed" => EnrollmentStatus::Failed,
            "cancelled" | "canceled" | "exited" => EnrollmentStatus::Cancelled,
            _ => EnrollmentStatus::Active,
        }
    }
}

/// Database enrollment record.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub contact_id: Uuid,
    pub site_id: Uuid,
    pub status: String,

    /// Step to run next; `None` means the first step.
    pub current_step_id: Option<Uuid>,

    /// Earliest time the processor should look at this enrollment again.
    pub next_run_at: Option<DateTime<Utc>>,

    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Enrollment {
    pub fn status(&self) -> EnrollmentStatus {
        EnrollmentStatus::from(self.status.as_str())
    }

    /// Whether the processor should pick this enrollment up at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status() == EnrollmentStatus::Active
            && self.next_run_at.map(|at| at <= now).unwrap_or(true)
    }
}

/// Request to create a new enrollment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEnrollment {
    pub workflow_id: Uuid,
    pub contact_id: Uuid,
    pub site_id: Uuid,
    pub next_run_at: DateTime<Utc>,
}
