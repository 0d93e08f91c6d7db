//! Enrollment queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Enrollment, EnrollmentStatus, NewEnrollment};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};

/// Active enrollments whose `next_run_at` has passed, oldest first.
///
/// Enrollments of workflows that exist but are not active are skipped so they
/// cannot crowd the batch. Enrollments whose workflow is gone are still
/// returned and get failed by the processor.
pub async fn get_due_enrollments(
    pool: &DbPool,
    now: DateTime<Utc>,
    limit: i64,
) -> AppResult<Vec<Enrollment>> {
    let enrollments = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT e.id, e.workflow_id, e.contact_id, e.site_id, e.status, e.current_step_id,
               e.next_run_at, e.enrolled_at, e.completed_at, e.last_error, e.updated_at
        FROM workflow_enrollments e
        LEFT JOIN workflows w ON w.id = e.workflow_id
        WHERE e.status = 'active'
          AND (e.next_run_at IS NULL OR e.next_run_at <= $1)
          AND (w.id IS NULL OR w.status = 'active')
        ORDER BY e.next_run_at ASC NULLS FIRST, e.enrolled_at ASC
        LIMIT $2
        "#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(enrollments)
}

/// Get an enrollment by ID.
pub async fn get_enrollment(pool: &DbPool, enrollment_id: Uuid) -> AppResult<Option<Enrollment>> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT id, workflow_id, contact_id, site_id, status, current_step_id, next_run_at,
               enrolled_at, completed_at, last_error, updated_at
        FROM workflow_enrollments
        WHERE id = $1
        "#,
    )
    .bind(enrollment_id)
    .fetch_optional(pool)
    .await?;

    Ok(enrollment)
}

/// Insert a new active enrollment.
pub async fn insert_enrollment(pool: &DbPool, new: &NewEnrollment) -> AppResult<Enrollment> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        INSERT INTO workflow_enrollments (workflow_id, contact_id, site_id, status, next_run_at)
        VALUES ($1, $2, $3, 'active', $4)
        RETURNING id, workflow_id, contact_id, site_id, status, current_step_id, next_run_at,
                  enrolled_at, completed_at, last_error, updated_at
        "#,
    )
    .bind(new.workflow_id)
    .bind(new.contact_id)
    .bind(new.site_id)
    .bind(new.next_run_at)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return AppError::Conflict(format!(
                    "Contact {} already has an active enrollment in workflow {}",
                    new.contact_id, new.workflow_id
                ));
            }
        }
        AppError::from(e)
    })?;

    Ok(enrollment)
}

/// Check whether the contact already has an active enrollment in the workflow.
pub async fn has_active_enrollment(
    pool: &DbPool,
    workflow_id: Uuid,
    contact_id: Uuid,
) -> AppResult<bool> {
    let row: Option<(i32,)> = sqlx::query_as(
        r#"
        SELECT 1
        FROM workflow_enrollments
        WHERE workflow_id = $1 AND contact_id = $2 AND status = 'active'
        LIMIT 1
        "#,
    )
    .bind(workflow_id)
    .bind(contact_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// Move the enrollment pointer and schedule the next visit.
pub async fn advance_enrollment(
    pool: &DbPool,
    enrollment_id: Uuid,
    next_step_id: Option<Uuid>,
    next_run_at: Option<DateTime<Utc>>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE workflow_enrollments
        SET current_step_id = $2, next_run_at = $3, updated_at = now()
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(enrollment_id)
    .bind(next_step_id)
    .bind(next_run_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Move an active enrollment into a terminal status.
///
/// Returns `false` when the enrollment was not active.
pub async fn finish_enrollment(
    pool: &DbPool,
    enrollment_id: Uuid,
    status: EnrollmentStatus,
    error: Option<&str>,
) -> AppResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE workflow_enrollments
        SET status = $2,
            last_error = $3,
            completed_at = now(),
            next_run_at = NULL,
            updated_at = now()
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(enrollment_id)
    .bind(status.to_string())
    .bind(error)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Count enrollments of a workflow grouped by status.
pub async fn count_by_status(pool: &DbPool, workflow_id: Uuid) -> AppResult<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT status, COUNT(*)
        FROM workflow_enrollments
        WHERE workflow_id = $1
        GROUP BY status
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
