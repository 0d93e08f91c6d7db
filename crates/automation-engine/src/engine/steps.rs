//! Typed step actions parsed from `workflow_steps` rows.
//!
//! A row carries a free-form `step_type` string and a JSON `config`. Parsing
//! happens once per visit so a malformed step fails the enrollment with a
//! message naming the step instead of surfacing deep inside execution.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::db::models::WorkflowStep;
use crate::delivery::HttpMethod;
use crate::error::{AppError, AppResult};
use crate::template::contains_template_syntax;

use super::delay::DelayUnit;

/// Known step type names.
pub mod step_type {
    pub const SEND_EMAIL: &str = "send_email";
    pub const WAIT: &str = "wait";
    pub const ADD_TAG: &str = "add_tag";
    pub const REMOVE_TAG: &str = "remove_tag";
    pub const CONDITION: &str = "condition";
    pub const WEBHOOK: &str = "webhook";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SendEmailConfig {
    pub subject: String,
    /// HTML body; may contain template syntax.
    pub body: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default)]
    pub from_email: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WaitConfig {
    pub duration: i64,
    #[serde(default)]
    pub unit: DelayUnit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagConfig {
    pub tag: String,
}

/// Comparison applied by a condition step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    #[serde(alias = "eq", alias = "equal")]
    Equals,
    #[serde(alias = "ne", alias = "not_equal")]
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    #[serde(alias = "gt")]
    GreaterThan,
    #[serde(alias = "lt")]
    LessThan,
    HasTag,
    NotHasTag,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionConfig {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub operator: Option<ConditionOperator>,
    #[serde(default)]
    pub value: Option<Value>,
    /// Template expression evaluated instead of field/operator when set.
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default, deserialize_with = "optional_uuid")]
    pub true_step_id: Option<Uuid>,
    #[serde(default, deserialize_with = "optional_uuid")]
    pub false_step_id: Option<Uuid>,
}

impl ConditionConfig {
    /// Branch target for an outcome; `None` falls through to the next step.
    pub fn branch(&self, outcome: bool) -> Option<Uuid> {
        if outcome {
            self.true_step_id
        } else {
            self.false_step_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// What a step does.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    SendEmail(SendEmailConfig),
    Wait(WaitConfig),
    AddTag(TagConfig),
    RemoveTag(TagConfig),
    Condition(ConditionConfig),
    Webhook(WebhookConfig),
}

impl StepAction {
    /// Parse and validate a step row.
    pub fn from_step(step: &WorkflowStep) -> AppResult<Self> {
        let action = match step.step_type.trim() {
            step_type::SEND_EMAIL => StepAction::SendEmail(parse_config(step)?),
            step_type::WAIT => StepAction::Wait(parse_config(step)?),
            step_type::ADD_TAG => StepAction::AddTag(parse_config(step)?),
            step_type::REMOVE_TAG => StepAction::RemoveTag(parse_config(step)?),
            step_type::CONDITION => StepAction::Condition(parse_config(step)?),
            step_type::WEBHOOK => StepAction::Webhook(parse_config(step)?),
            other => {
                return Err(AppError::InvalidStep(format!(
                    "Unknown step type '{}' (step {})",
                    other, step.id
                )))
            }
        };

        action.validate().map_err(|msg| {
            AppError::InvalidStep(format!("{} step {}: {}", step.step_type, step.id, msg))
        })?;

        Ok(action)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            StepAction::SendEmail(_) => step_type::SEND_EMAIL,
            StepAction::Wait(_) => step_type::WAIT,
            StepAction::AddTag(_) => step_type::ADD_TAG,
            StepAction::RemoveTag(_) => step_type::REMOVE_TAG,
            StepAction::Condition(_) => step_type::CONDITION,
            StepAction::Webhook(_) => step_type::WEBHOOK,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            StepAction::SendEmail(cfg) => {
                if cfg.subject.trim().is_empty() {
                    return Err("subject is required".to_string());
                }
            }
            StepAction::Wait(cfg) => {
                if cfg.duration <= 0 {
                    return Err(format!("duration must be positive, got {}", cfg.duration));
                }
            }
            StepAction::AddTag(cfg) | StepAction::RemoveTag(cfg) => {
                if cfg.tag.trim().is_empty() {
                    return Err("tag is required".to_string());
                }
            }
            StepAction::Condition(cfg) => {
                let has_expression = cfg
                    .expression
                    .as_deref()
                    .is_some_and(|e| !e.trim().is_empty());
                if !has_expression && cfg.operator.is_none() {
                    return Err("either expression or operator is required".to_string());
                }
                let needs_field = !matches!(
                    cfg.operator,
                    Some(ConditionOperator::HasTag) | Some(ConditionOperator::NotHasTag) | None
                );
                if !has_expression && needs_field && cfg.field.is_none() {
                    return Err("field is required for this operator".to_string());
                }
            }
            StepAction::Webhook(cfg) => {
                // Templated urls are checked once rendered.
                if !contains_template_syntax(&cfg.url) && !is_http_url(&cfg.url) {
                    return Err(format!("url must be http(s), got '{}'", cfg.url));
                }
            }
        }
        Ok(())
    }
}

/// Whether `url` has an http or https scheme.
pub(crate) fn is_http_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("http://") || url.starts_with("https://")
}

fn parse_config<T: serde::de::DeserializeOwned>(step: &WorkflowStep) -> AppResult<T> {
    serde_json::from_value(step.config.clone()).map_err(|e| {
        AppError::InvalidStep(format!(
            "{} step {} has invalid config: {}",
            step.step_type, step.id, e
        ))
    })
}

/// Builders store unset branch targets as `""` or `null`.
fn optional_uuid<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s).map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn step(step_type: &str, config: Value) -> WorkflowStep {
        WorkflowStep {
            id: Uuid::new_v4(),
            workflow_id: Uuid::new_v4(),
            step_order: 0,
            step_type: step_type.to_string(),
            config,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_parse_send_email() {
        let action = StepAction::from_step(&step(
            "send_email",
            json!({"subject": "Hi {{ contact.first_name }}", "body": "<p>Welcome</p>"}),
        ))
        .unwrap();
        match action {
            StepAction::SendEmail(cfg) => {
                assert_eq!(cfg.body, "<p>Welcome</p>");
                assert!(cfg.reply_to.is_none());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_wait_defaults_to_hours() {
        let action = StepAction::from_step(&step("wait", json!({"duration": 3}))).unwrap();
        assert_eq!(
            action,
            StepAction::Wait(WaitConfig { duration: 3, unit: DelayUnit::Hours })
        );
    }

    #[test]
    fn test_wait_rejects_zero() {
        let err = StepAction::from_step(&step("wait", json!({"duration": 0, "unit": "days"})));
        assert!(matches!(err, Err(AppError::InvalidStep(_))));
    }

    #[test]
    fn test_unknown_step_type() {
        let err = StepAction::from_step(&step("send_sms", json!({}))).unwrap_err();
        assert!(err.to_string().contains("Unknown step type 'send_sms'"));
    }

    #[test]
    fn test_tag_requires_value() {
        assert!(StepAction::from_step(&step("add_tag", json!({"tag": "  "}))).is_err());
        assert!(StepAction::from_step(&step("remove_tag", json!({}))).is_err());
    }

    #[test]
    fn test_condition_blank_branch_targets() {
        let target = Uuid::new_v4();
        let action = StepAction::from_step(&step(
            "condition",
            json!({
                "field": "email",
                "operator": "contains",
                "value": "@gmail.com",
                "true_step_id": target.to_string(),
                "false_step_id": ""
            }),
        ))
        .unwrap();
        let StepAction::Condition(cfg) = action else {
            panic!("expected condition");
        };
        assert_eq!(cfg.branch(true), Some(target));
        assert_eq!(cfg.branch(false), None);
    }

    #[test]
    fn test_condition_requires_operator_or_expression() {
        assert!(StepAction::from_step(&step("condition", json!({"field": "email"}))).is_err());
        assert!(StepAction::from_step(&step(
            "condition",
            json!({"expression": "'vip' in contact.tags"})
        ))
        .is_ok());
        assert!(StepAction::from_step(&step(
            "condition",
            json!({"operator": "has_tag", "value": "vip"})
        ))
        .is_ok());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let err = StepAction::from_step(&step(
            "condition",
            json!({"field": "email", "operator": "matches_regex", "value": ".*"}),
        ));
        assert!(matches!(err, Err(AppError::InvalidStep(_))));
    }

    #[test]
    fn test_webhook_defaults() {
        let action = StepAction::from_step(&step(
            "webhook",
            json!({"url": "https://hooks.example.com/in"}),
        ))
        .unwrap();
        let StepAction::Webhook(cfg) = action else {
            panic!("expected webhook");
        };
        assert_eq!(cfg.method, HttpMethod::POST);
        assert!(cfg.headers.is_empty());
        assert!(cfg.payload.is_none());
    }

    #[test]
    fn test_webhook_url_scheme() {
        assert!(StepAction::from_step(&step("webhook", json!({"url": "ftp://x"}))).is_err());
    }

    #[test]
    fn test_templated_webhook_url_parses() {
        let parsed = StepAction::from_step(&step(
            "webhook",
            json!({"url": "{{ contact.custom_fields.hook_url }}"}),
        ));
        assert!(parsed.is_ok());
        assert!(is_http_url(" https://hooks.test/a"));
        assert!(!is_http_url("hooks.test/a"));
    }
}
