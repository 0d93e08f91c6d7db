//! Step execution queries.

use uuid::Uuid;

use crate::db::models::{ExecutionStatus, NewStepExecution, StepExecution};
use crate::db::DbPool;
use crate::error::AppResult;

/// Latest execution of a step for an enrollment.
pub async fn find_execution(
    pool: &DbPool,
    enrollment_id: Uuid,
    step_id: Uuid,
) -> AppResult<Option<StepExecution>> {
    let execution = sqlx::query_as::<_, StepExecution>(
        r#"
        SELECT id, enrollment_id, step_id, status, result, error, scheduled_for,
               executed_at, created_at
        FROM workflow_step_executions
        WHERE enrollment_id = $1 AND step_id = $2
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(enrollment_id)
    .bind(step_id)
    .fetch_optional(pool)
    .await?;

    Ok(execution)
}

/// Insert a step execution record.
pub async fn insert_execution(pool: &DbPool, new: &NewStepExecution) -> AppResult<StepExecution> {
    let execution = sqlx::query_as::<_, StepExecution>(
        r#"
        INSERT INTO workflow_step_executions (
            enrollment_id, step_id, status, result, error, scheduled_for
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, enrollment_id, step_id, status, result, error, scheduled_for,
                  executed_at, created_at
        "#,
    )
    .bind(new.enrollment_id)
    .bind(new.step_id)
    .bind(new.status.to_string())
    .bind(&new.result)
    .bind(&new.error)
    .bind(new.scheduled_for)
    .fetch_one(pool)
    .await?;

    Ok(execution)
}

/// Update the status of an execution (e.g. a wait that has elapsed).
pub async fn update_execution(
    pool: &DbPool,
    execution_id: Uuid,
    status: ExecutionStatus,
    result: Option<&serde_json::Value>,
    error: Option<&str>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE workflow_step_executions
        SET status = $2,
            result = COALESCE($3, result),
            error = $4,
            executed_at = now()
        WHERE id = $1
        "#,
    )
    .bind(execution_id)
    .bind(status.to_string())
    .bind(result)
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}

/// All executions of an enrollment, oldest first.
pub async fn get_executions_for_enrollment(
    pool: &DbPool,
    enrollment_id: Uuid,
) -> AppResult<Vec<StepExecution>> {
    let executions = sqlx::query_as::<_, StepExecution>(
        r#"
        SELECT id, enrollment_id, step_id, status, result, error, scheduled_for,
               executed_at, created_at
        FROM workflow_step_executions
        WHERE enrollment_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(enrollment_id)
    .fetch_all(pool)
    .await?;

    Ok(executions)
}
