//! Per-workflow enrollment statistics.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::EnrollmentStatus;
use crate::error::{AppError, AppResult};
use crate::store::WorkflowStore;

/// Enrollment counts for one workflow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStats {
    pub workflow_id: Uuid,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub total: i64,
    /// Percentage of enrollments completed, one decimal.
    pub completion_rate: f64,
}

impl WorkflowStats {
    /// Fold raw `(status, count)` rows into stats.
    pub fn from_counts(workflow_id: Uuid, counts: &[(String, i64)]) -> Self {
        let mut stats = WorkflowStats {
            workflow_id,
            ..Default::default()
        };

        for (status, count) in counts {
            match EnrollmentStatus::from(status.as_str()) {
                EnrollmentStatus::Active => stats.active += count,
                EnrollmentStatus::Completed => stats.completed += count,
                EnrollmentStatus::Failed => stats.failed += count,
                EnrollmentStatus::Cancelled => stats.cancelled += count,
            }
            stats.total += count;
        }

        stats.completion_rate = completion_rate(stats.completed, stats.total);
        stats
    }
}

fn completion_rate(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let rate = completed as f64 / total as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// Workflow reporting service.
#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn WorkflowStore>,
}

impl StatsService {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub async fn workflow_stats(&self, workflow_id: Uuid) -> AppResult<WorkflowStats> {
        if self.store.workflow(workflow_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Workflow not found: {}",
                workflow_id
            )));
        }

        let counts = self.store.enrollment_status_counts(workflow_id).await?;
        Ok(WorkflowStats::from_counts(workflow_id, &counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_rate_rounding() {
        assert_eq!(completion_rate(0, 0), 0.0);
        assert_eq!(completion_rate(1, 3), 33.3);
        assert_eq!(completion_rate(2, 3), 66.7);
        assert_eq!(completion_rate(5, 5), 100.0);
    }

    #[test]
    fn test_from_counts() {
        let id = Uuid::new_v4();
        let counts = vec![
            ("active".to_string(), 3),
            ("completed".to_string(), 6),
            ("failed".to_string(), 1),
            ("canceled".to_string(), 2),
        ];
        let stats = WorkflowStats::from_counts(id, &counts);
        assert_eq!(stats.total, 12);
        assert_eq!(stats.cancelled, 2);
        assert_eq!(stats.completion_rate, 50.0);
    }

    #[tokio::test]
    async fn test_unknown_workflow() {
        let service = StatsService::new(Arc::new(crate::store::MemoryStore::new()));
        let err = service.workflow_stats(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
