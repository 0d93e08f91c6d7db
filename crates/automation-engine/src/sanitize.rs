//! Redaction of credentials before step results are persisted.
//!
//! Webhook steps carry user-supplied headers and payloads which often hold
//! API keys or signing secrets. Everything written to
//! `workflow_step_executions.result` goes through [`sanitize_sensitive_data`].

use serde_json::{Map, Value};

const REDACTED: &str = "[REDACTED]";

/// Key fragments that mark a value as sensitive (lowercase, `-` folded to `_`).
static SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "bearer",
    "api_key",
    "apikey",
    "authorization",
    "credential",
    "private_key",
    "signing_key",
    "cookie",
    "session",
];

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase().replace('-', "_");
    SENSITIVE_KEYS.iter().any(|s| key_lower.contains(s))
}

fn is_sensitive_value(value: &str) -> bool {
    let lower = value.to_lowercase();
    if lower.starts_with("bearer ") || lower.starts_with("basic ") {
        return true;
    }

    // JWT (header.payload.signature)
    if value.starts_with("eyJ")
        && value.chars().filter(|&c| c == '.').count() == 2
        && value.len() > 50
    {
        return true;
    }

    // Provider keys such as `re_...`, `sk_live_...`, `whsec_...`
    ["sk_live_", "sk_test_", "rk_live_", "whsec_", "re_"]
        .iter()
        .any(|prefix| value.starts_with(prefix) && value.len() >= 20 && !value.contains(' '))
}

/// Recursively redact sensitive keys and values from a JSON value.
///
/// Returns a new value; the input is not modified. Nesting deeper than 20
/// levels is returned unchanged.
pub fn sanitize_sensitive_data(value: &Value) -> Value {
    sanitize_recursive(value, 0, 20)
}

fn sanitize_recursive(value: &Value, depth: usize, max_depth: usize) -> Value {
    if depth >= max_depth {
        return value.clone();
    }

    match value {
        Value::Object(map) => {
            let mut result = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) {
                    result.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    result.insert(key.clone(), sanitize_recursive(val, depth + 1, max_depth));
                }
            }
            Value::Object(result)
        }
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|item| sanitize_recursive(item, depth + 1, max_depth))
                .collect(),
        ),
        Value::String(s) if is_sensitive_value(s) => Value::String(REDACTED.to_string()),
        _ => value.clone(),
    }
}

/// Redact HTTP headers that carry credentials.
pub fn sanitize_headers<'a, I>(headers: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    const SENSITIVE_HEADERS: [&str; 5] = [
        "authorization",
        "proxy-authorization",
        "x-api-key",
        "x-webhook-signature",
        "cookie",
    ];

    headers
        .into_iter()
        .map(|(key, value)| {
            let redact = SENSITIVE_HEADERS.contains(&key.to_lowercase().as_str())
                || is_sensitive_key(key)
                || is_sensitive_value(value);
            let value = if redact { REDACTED } else { value.as_str() };
            (key.clone(), Value::String(value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_sanitize_secret_keys() {
        let data = json!({"url": "https://hooks.example.com", "webhook_secret": "abc"});
        let result = sanitize_sensitive_data(&data);
        assert_eq!(result["url"], "https://hooks.example.com");
        assert_eq!(result["webhook_secret"], "[REDACTED]");
    }

    #[test]
    fn test_sanitize_bearer_value() {
        let data = json!({"note": "Bearer xyz123abc456"});
        let result = sanitize_sensitive_data(&data);
        assert_eq!(result["note"], "[REDACTED]");
    }

    #[test]
    fn test_sanitize_provider_key_value() {
        let data = json!({"value": "sk_live_51HxYzAbCdEfGhIjKl"});
        assert_eq!(sanitize_sensitive_data(&data)["value"], "[REDACTED]");
    }

    #[test]
    fn test_sanitize_nested_array() {
        let data = json!({"items": [{"name": "a", "access_token": "t1"}]});
        let result = sanitize_sensitive_data(&data);
        assert_eq!(result["items"][0]["name"], "a");
        assert_eq!(result["items"][0]["access_token"], "[REDACTED]");
    }

    #[test]
    fn test_contact_data_preserved() {
        let data = json!({
            "email": "ada@example.com",
            "first_name": "Ada",
            "tags": ["vip"],
            "custom_fields": {"author": "yes", "orders": 2}
        });
        assert_eq!(sanitize_sensitive_data(&data), data);
    }

    #[test]
    fn test_sanitize_headers() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer abc".to_string());
        headers.insert("X-Source".to_string(), "automation".to_string());

        let result = sanitize_headers(&headers);
        assert_eq!(result["Authorization"], "[REDACTED]");
        assert_eq!(result["X-Source"], "automation");
    }
}
