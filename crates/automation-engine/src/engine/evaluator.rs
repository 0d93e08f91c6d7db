//! Condition evaluation for branch steps.
//!
//! A condition either compares a contact field against a value with one of
//! the [`ConditionOperator`]s, or evaluates a template expression such as
//! `"vip" in contact.tags`.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::db::models::Contact;
use crate::error::{AppError, AppResult};
use crate::template::{TemplateContext, TemplateRenderer};

use super::steps::{ConditionConfig, ConditionOperator};

/// Evaluates condition steps against a contact.
pub struct ConditionEvaluator {
    renderer: TemplateRenderer,
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self {
            renderer: TemplateRenderer::new(),
        }
    }

    /// Evaluate a condition; `context` is only used for expressions.
    pub fn evaluate(
        &self,
        condition: &ConditionConfig,
        contact: &Contact,
        context: &TemplateContext,
    ) -> AppResult<bool> {
        if let Some(expr) = condition.expression.as_deref() {
            if !expr.trim().is_empty() {
                return self.renderer.evaluate_condition(expr, context);
            }
        }

        let operator = condition
            .operator
            .ok_or_else(|| AppError::InvalidStep("condition has no operator".to_string()))?;
        let target = condition.value.clone().unwrap_or(Value::Null);

        match operator {
            ConditionOperator::HasTag => Ok(contact.has_tag(&as_text(&target))),
            ConditionOperator::NotHasTag => Ok(!contact.has_tag(&as_text(&target))),
            _ => {
                let field = condition.field.as_deref().ok_or_else(|| {
                    AppError::InvalidStep("condition has no field".to_string())
                })?;
                Ok(compare(operator, &contact.field(field), &target))
            }
        }
    }
}

/// Apply a field operator.
pub fn compare(operator: ConditionOperator, actual: &Value, target: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => equals(actual, target),
        ConditionOperator::NotEquals => !equals(actual, target),
        ConditionOperator::Contains => contains(actual, target),
        ConditionOperator::NotContains => !contains(actual, target),
        ConditionOperator::StartsWith => {
            !is_empty(actual) && fold(actual).starts_with(&fold(target))
        }
        ConditionOperator::EndsWith => !is_empty(actual) && fold(actual).ends_with(&fold(target)),
        ConditionOperator::IsEmpty => is_empty(actual),
        ConditionOperator::IsNotEmpty => !is_empty(actual),
        ConditionOperator::GreaterThan => {
            ordering(actual, target) == Some(std::cmp::Ordering::Greater)
        }
        ConditionOperator::LessThan => ordering(actual, target) == Some(std::cmp::Ordering::Less),
        // Tag operators are resolved against the contact, not a field.
        ConditionOperator::HasTag | ConditionOperator::NotHasTag => false,
    }
}

/// Loose equality: numbers compare numerically, text ignores case.
fn equals(actual: &Value, target: &Value) -> bool {
    if actual == target {
        return true;
    }

    match (actual, target) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (Value::Bool(b), Value::String(s)) | (Value::String(s), Value::Bool(b)) => {
            match s.trim().to_lowercase().as_str() {
                "true" => *b,
                "false" => !*b,
                _ => false,
            }
        }
        (Value::String(a), Value::String(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        (Value::Null, Value::String(s)) | (Value::String(s), Value::Null) => s.is_empty(),
        _ => false,
    }
}

fn contains(actual: &Value, target: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| equals(item, target)),
        Value::Null => false,
        _ => fold(actual).contains(&fold(target)),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(arr) => arr.is_empty(),
        Value::Object(obj) => obj.is_empty(),
        _ => false,
    }
}

/// Numbers first, then RFC 3339 timestamps; anything else is incomparable.
fn ordering(actual: &Value, target: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(target)) {
        return a.partial_cmp(&b);
    }
    if let (Some(a), Some(b)) = (as_timestamp(actual), as_timestamp(target)) {
        return Some(a.cmp(&b));
    }
    None
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn fold(value: &Value) -> String {
    as_text(value).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn contact() -> Contact {
        Contact {
            id: Uuid::new_v4(),
            site_id: Uuid::new_v4(),
            email: "Ada@Example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: None,
            tags: vec!["vip".to_string(), "lead".to_string()],
            custom_fields: json!({"orders": "12", "plan": "pro", "renews_at": "2026-03-01T00:00:00Z"}),
            unsubscribed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn cond(field: &str, operator: ConditionOperator, value: Value) -> ConditionConfig {
        ConditionConfig {
            field: Some(field.to_string()),
            operator: Some(operator),
            value: Some(value),
            expression: None,
            true_step_id: None,
            false_step_id: None,
        }
    }

    fn eval(config: ConditionConfig) -> bool {
        let contact = contact();
        let mut ctx = TemplateContext::new();
        ctx.insert("contact".to_string(), contact.to_template_value());
        ConditionEvaluator::new()
            .evaluate(&config, &contact, &ctx)
            .unwrap()
    }

    #[test]
    fn test_equals_ignores_case() {
        assert!(eval(cond("email", ConditionOperator::Equals, json!("ada@example.com"))));
        assert!(eval(cond("plan", ConditionOperator::NotEquals, json!("free"))));
    }

    #[test]
    fn test_equals_numeric_coercion() {
        assert!(eval(cond("custom_fields.orders", ConditionOperator::Equals, json!(12))));
    }

    #[test]
    fn test_contains_on_string_and_tags() {
        assert!(eval(cond("email", ConditionOperator::Contains, json!("@example"))));
        assert!(eval(cond("tags", ConditionOperator::Contains, json!("LEAD"))));
        assert!(eval(cond("tags", ConditionOperator::NotContains, json!("customer"))));
    }

    #[test]
    fn test_starts_and_ends_with() {
        assert!(eval(cond("first_name", ConditionOperator::StartsWith, json!("ad"))));
        assert!(eval(cond("email", ConditionOperator::EndsWith, json!(".com"))));
        assert!(!eval(cond("last_name", ConditionOperator::StartsWith, json!(""))));
    }

    #[test]
    fn test_emptiness() {
        assert!(eval(cond("last_name", ConditionOperator::IsEmpty, Value::Null)));
        assert!(eval(cond("missing_field", ConditionOperator::IsEmpty, Value::Null)));
        assert!(eval(cond("tags", ConditionOperator::IsNotEmpty, Value::Null)));
    }

    #[test]
    fn test_ordering() {
        assert!(eval(cond("orders", ConditionOperator::GreaterThan, json!(10))));
        assert!(!eval(cond("orders", ConditionOperator::LessThan, json!("5"))));
        assert!(eval(cond(
            "renews_at",
            ConditionOperator::LessThan,
            json!("2026-06-01T00:00:00Z")
        )));
        assert!(!eval(cond("plan", ConditionOperator::GreaterThan, json!(1))));
    }

    #[test]
    fn test_tag_operators() {
        let mut config = cond("tags", ConditionOperator::HasTag, json!("VIP"));
        config.field = None;
        assert!(eval(config.clone()));
        config.operator = Some(ConditionOperator::NotHasTag);
        assert!(!eval(config));
    }

    #[test]
    fn test_expression() {
        let config = ConditionConfig {
            field: None,
            operator: None,
            value: None,
            expression: Some("{{ 'vip' in contact.tags and contact.first_name == 'Ada' }}".to_string()),
            true_step_id: None,
            false_step_id: None,
        };
        assert!(eval(config));
    }
}
