//! Email send log queries.

use uuid::Uuid;

use crate::db::models::NewEmailSend;
use crate::db::DbPool;
use crate::error::AppResult;

/// Insert an email send record.
pub async fn insert_email_send(pool: &DbPool, send: &NewEmailSend) -> AppResult<Uuid> {
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO email_sends (
            site_id, contact_id, enrollment_id, subject, status, provider_message_id, error
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(send.site_id)
    .bind(send.contact_id)
    .bind(send.enrollment_id)
    .bind(&send.subject)
    .bind(send.status.to_string())
    .bind(&send.provider_message_id)
    .bind(&send.error)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}
