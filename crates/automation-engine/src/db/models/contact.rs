//! Contact and site models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A CRM contact belonging to a site.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Contact {
    pub id: Uuid,
    pub site_id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tags: Vec<String>,
    pub custom_fields: Value,
    pub unsubscribed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// First and last name joined, or the email when neither is set.
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }

    /// Tag lookup is case-insensitive; tags are user-typed labels.
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Resolve a field name to its value.
    ///
    /// Known columns resolve directly; `custom_fields.<key>` and bare keys
    /// fall back to the custom field map. Missing fields are `Null`.
    pub fn field(&self, name: &str) -> Value {
        let opt = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

        match name {
            "email" => Value::String(self.email.clone()),
            "first_name" => opt(&self.first_name),
            "last_name" => opt(&self.last_name),
            "full_name" => Value::String(self.full_name()),
            "tags" => Value::from(self.tags.clone()),
            "unsubscribed" => Value::Bool(self.unsubscribed),
            other => {
                let key = other.strip_prefix("custom_fields.").unwrap_or(other);
                self.custom_fields.get(key).cloned().unwrap_or(Value::Null)
            }
        }
    }

    /// Template-facing view of the contact.
    pub fn to_template_value(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "email": self.email,
            "first_name": self.first_name.clone().unwrap_or_default(),
            "last_name": self.last_name.clone().unwrap_or_default(),
            "full_name": self.full_name(),
            "tags": self.tags,
            "custom_fields": self.custom_fields,
        })
    }
}

/// Tenant site; only the sender identity is needed here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: Uuid,
    pub name: String,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact() -> Contact {
        Contact {
            id: Uuid::new_v4(),
            site_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            tags: vec!["VIP".to_string(), "lead".to_string()],
            custom_fields: json!({"plan": "pro", "orders": 3}),
            unsubscribed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_full_name_falls_back_to_email() {
        let mut c = contact();
        assert_eq!(c.full_name(), "Ada");
        c.first_name = None;
        assert_eq!(c.full_name(), "ada@example.com");
    }

    #[test]
    fn test_has_tag_ignores_case() {
        let c = contact();
        assert!(c.has_tag("vip"));
        assert!(c.has_tag(" Lead "));
        assert!(!c.has_tag("customer"));
    }

    #[test]
    fn test_field_resolution() {
        let c = contact();
        assert_eq!(c.field("email"), json!("ada@example.com"));
        assert_eq!(c.field("last_name"), Value::Null);
        assert_eq!(c.field("custom_fields.plan"), json!("pro"));
        assert_eq!(c.field("orders"), json!(3));
        assert_eq!(c.field("missing"), Value::Null);
    }
}
