//! Jinja2-style template rendering using minijinja.

use std::collections::HashMap;

use minijinja::{Environment, Error, ErrorKind, UndefinedBehavior, Value};

use crate::error::{AppError, AppResult};

/// Variables visible to a template.
pub type TemplateContext = HashMap<String, serde_json::Value>;

/// Template renderer with custom filters.
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    /// Create a new template renderer with custom filters.
    pub fn new() -> Self {
        let mut env = Environment::new();

        // Missing contact fields render as empty strings.
        env.set_undefined_behavior(UndefinedBehavior::Lenient);

        env.add_filter("tojson", filter_tojson);
        env.add_filter("int", filter_int);
        env.add_filter("string", filter_string);
        env.add_filter("fallback", filter_fallback);

        env.add_test("empty", test_empty);

        Self { env }
    }

    /// Render a template string with the given context.
    pub fn render(&self, template: &str, context: &TemplateContext) -> AppResult<String> {
        if !contains_template_syntax(template) {
            return Ok(template.to_string());
        }

        self.env
            .render_str(template, Value::from_serialize(context))
            .map_err(|e| AppError::Template(format!("Template render error: {}", e)))
    }

    /// Render a nested structure (object or array) recursively.
    ///
    /// Strings are rendered; a string that is a single `{{ expr }}` keeps the
    /// JSON type of the expression result.
    pub fn render_value(
        &self,
        value: &serde_json::Value,
        context: &TemplateContext,
    ) -> AppResult<serde_json::Value> {
        match value {
            serde_json::Value::String(s) => self.render_string_value(s, context),
            serde_json::Value::Object(map) => {
                let mut result = serde_json::Map::new();
                for (k, v) in map {
                    result.insert(k.clone(), self.render_value(v, context)?);
                }
                Ok(serde_json::Value::Object(result))
            }
            serde_json::Value::Array(arr) => {
                let result: Result<Vec<_>, _> =
                    arr.iter().map(|v| self.render_value(v, context)).collect();
                Ok(serde_json::Value::Array(result?))
            }
            _ => Ok(value.clone()),
        }
    }

    /// Evaluate a boolean expression such as `"vip" in contact.tags`.
    ///
    /// Surrounding `{{ }}` is accepted and stripped.
    pub fn evaluate_condition(&self, condition: &str, context: &TemplateContext) -> AppResult<bool> {
        let expr = strip_expression_braces(condition);
        let compiled = self
            .env
            .compile_expression_owned(expr.to_string())
            .map_err(|e| AppError::Template(format!("Expression parse error: {}", e)))?;

        let value = compiled
            .eval(Value::from_serialize(context))
            .map_err(|e| AppError::Template(format!("Expression eval error: {}", e)))?;

        Ok(value.is_true())
    }

    fn render_string_value(
        &self,
        s: &str,
        context: &TemplateContext,
    ) -> AppResult<serde_json::Value> {
        if !contains_template_syntax(s) {
            return Ok(serde_json::Value::String(s.to_string()));
        }

        let trimmed = s.trim();
        let single_expr = trimmed.starts_with("{{")
            && trimmed.ends_with("}}")
            && trimmed.matches("{{").count() == 1;

        if single_expr {
            let expr = strip_expression_braces(trimmed);
            let compiled = self
                .env
                .compile_expression_owned(expr.to_string())
                .map_err(|e| AppError::Template(format!("Expression parse error: {}", e)))?;
            let value = compiled
                .eval(Value::from_serialize(context))
                .map_err(|e| AppError::Template(format!("Expression eval error: {}", e)))?;
            if value.is_undefined() {
                return Ok(serde_json::Value::Null);
            }
            return serde_json::to_value(&value).map_err(AppError::from);
        }

        self.render(s, context).map(serde_json::Value::String)
    }
}

/// Check if a string contains Jinja2 template syntax.
pub fn contains_template_syntax(s: &str) -> bool {
    (s.contains("{{") && s.contains("}}")) || (s.contains("{%") && s.contains("%}"))
}

fn strip_expression_braces(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

fn filter_tojson(value: &Value) -> Result<String, Error> {
    serde_json::to_string(value).map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
}

fn filter_int(value: &Value) -> Result<i64, Error> {
    if let Ok(i) = i64::try_from(value.clone()) {
        return Ok(i);
    }
    if let Some(s) = value.as_str() {
        return s.trim().parse::<i64>().map_err(|e| {
            Error::new(ErrorKind::InvalidOperation, format!("Cannot convert to int: {}", e))
        });
    }
    Err(Error::new(ErrorKind::InvalidOperation, "Cannot convert to int"))
}

fn filter_string(value: &Value) -> String {
    value.to_string()
}

/// Like `default`, but also replaces empty strings (unset contact names are `""`).
fn filter_fallback(value: &Value, fallback: Option<&Value>) -> Value {
    let empty = value.is_undefined()
        || value.is_none()
        || value.as_str().map(|s| s.trim().is_empty()).unwrap_or(false);

    if empty {
        fallback.cloned().unwrap_or_else(|| Value::from(""))
    } else {
        value.clone()
    }
}

fn test_empty(value: &Value) -> bool {
    value.is_undefined()
        || value.is_none()
        || value.as_str().map(str::is_empty).unwrap_or(false)
        || value.len() == Some(0)
}
