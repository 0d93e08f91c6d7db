//! Schema bootstrap and validation.

use serde::Serialize;

use crate::db::DbPool;
use crate::error::AppResult;

/// DDL for every table the engine reads or writes.
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Tables that must exist for the processor to run.
pub const REQUIRED_TABLES: [&str; 7] = [
    "sites",
    "contacts",
    "workflows",
    "workflow_steps",
    "workflow_enrollments",
    "workflow_step_executions",
    "email_sends",
];

/// Result of a schema validation.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaReport {
    pub schema: String,
    pub valid: bool,
    pub tables: Vec<String>,
    pub missing: Vec<String>,
}

/// Split the embedded DDL into individual statements.
///
/// Comment lines are dropped; statements are separated by `;`.
pub fn statements(sql: &str) -> Vec<String> {
    let without_comments: String = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    without_comments
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply the embedded schema. Every statement is idempotent.
pub async fn init_schema(pool: &DbPool) -> AppResult<usize> {
    let statements = statements(SCHEMA_SQL);
    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::info!(statements = statements.len(), "Schema applied");
    Ok(statements.len())
}

/// Report which required tables exist in `schema`.
pub async fn validate_schema(pool: &DbPool, schema: &str) -> AppResult<SchemaReport> {
    let found: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT table_name::TEXT
        FROM information_schema.tables
        WHERE table_schema = $1
        "#,
    )
    .bind(schema)
    .fetch_all(pool)
    .await?;

    Ok(build_report(schema, &found))
}

fn build_report(schema: &str, found: &[String]) -> SchemaReport {
    let (tables, missing): (Vec<String>, Vec<String>) = REQUIRED_TABLES
        .iter()
        .map(|t| t.to_string())
        .partition(|t| found.contains(t));

    SchemaReport {
        schema: schema.to_string(),
        valid: missing.is_empty(),
        tables,
        missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_cover_required_tables() {
        let statements = statements(SCHEMA_SQL);
        for table in REQUIRED_TABLES {
            let needle = format!("CREATE TABLE IF NOT EXISTS {} ", table);
            assert!(
                statements.iter().any(|s| s.starts_with(&needle)),
                "missing DDL for {}",
                table
            );
        }
    }

    #[test]
    fn test_statements_skip_comments() {
        let statements = statements("-- header\nSELECT 1;\n\n-- trailing\n");
        assert_eq!(statements, vec!["SELECT 1".to_string()]);
    }

    #[test]
    fn test_build_report_missing() {
        let found = vec!["contacts".to_string(), "workflows".to_string()];
        let report = build_report("public", &found);
        assert!(!report.valid);
        assert_eq!(report.tables, vec!["contacts", "workflows"]);
        assert!(report.missing.contains(&"workflow_enrollments".to_string()));
    }
}
