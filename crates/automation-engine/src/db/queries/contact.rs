//! Contact and site queries.

use uuid::Uuid;

use crate::db::models::{Contact, Site};
use crate::db::DbPool;
use crate::error::AppResult;

/// Get a contact by ID.
pub async fn get_contact(pool: &DbPool, contact_id: Uuid) -> AppResult<Option<Contact>> {
    let contact = sqlx::query_as::<_, Contact>(
        r#"
        SELECT id, site_id, email, first_name, last_name, tags, custom_fields,
               unsubscribed, created_at, updated_at
        FROM contacts
        WHERE id = $1
        "#,
    )
    .bind(contact_id)
    .fetch_optional(pool)
    .await?;

    Ok(contact)
}

/// Replace a contact's tag list.
pub async fn set_contact_tags(pool: &DbPool, contact_id: Uuid, tags: &[String]) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE contacts
        SET tags = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(contact_id)
    .bind(tags)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a site by ID.
pub async fn get_site(pool: &DbPool, site_id: Uuid) -> AppResult<Option<Site>> {
    let site = sqlx::query_as::<_, Site>(
        r#"
        SELECT id, name, from_email, from_name
        FROM sites
        WHERE id = $1
        "#,
    )
    .bind(site_id)
    .fetch_optional(pool)
    .await?;

    Ok(site)
}
