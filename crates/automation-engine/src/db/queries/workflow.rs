//! Workflow definition queries.

use uuid::Uuid;

use crate::db::models::{Workflow, WorkflowStep};
use crate::db::DbPool;
use crate::error::AppResult;

/// Get a workflow by ID.
pub async fn get_workflow(pool: &DbPool, workflow_id: Uuid) -> AppResult<Option<Workflow>> {
    let workflow = sqlx::query_as::<_, Workflow>(
        r#"
        SELECT id, site_id, name, status, trigger_type, trigger_config, created_at, updated_at
        FROM workflows
        WHERE id = $1
        "#,
    )
    .bind(workflow_id)
    .fetch_optional(pool)
    .await?;

    Ok(workflow)
}

/// Get the steps of a workflow in execution order.
pub async fn get_workflow_steps(pool: &DbPool, workflow_id: Uuid) -> AppResult<Vec<WorkflowStep>> {
    let steps = sqlx::query_as::<_, WorkflowStep>(
        r#"
        SELECT id, workflow_id, step_order, step_type, config, created_at
        FROM workflow_steps
        WHERE workflow_id = $1
        ORDER BY step_order ASC, created_at ASC
        "#,
    )
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(steps)
}

/// Active workflows of a site listening for the given trigger type.
pub async fn get_active_workflows_for_trigger(
    pool: &DbPool,
    site_id: Uuid,
    trigger_type: &str,
) -> AppResult<Vec<Workflow>> {
    let workflows = sqlx::query_as::<_, Workflow>(
        r#"
        SELECT id, site_id, name, status, trigger_type, trigger_config, created_at, updated_at
        FROM workflows
        WHERE site_id = $1 AND trigger_type = $2 AND status = 'active'
        ORDER BY created_at ASC
        "#,
    )
    .bind(site_id)
    .bind(trigger_type)
    .fetch_all(pool)
    .await?;

    Ok(workflows)
}
