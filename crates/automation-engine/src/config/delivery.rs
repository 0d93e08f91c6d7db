//! Outbound delivery configuration (email provider, webhooks).

use serde::Deserialize;

/// Email delivery configuration loaded from environment variables.
///
/// Environment variables are prefixed with `RESEND_`:
/// - `RESEND_API_KEY`: Provider API key
/// - `RESEND_BASE_URL`: Provider API base URL (default: "https://api.resend.com")
/// - `RESEND_DEFAULT_FROM`: Fallback sender address
/// - `RESEND_TIMEOUT_SECS`: Request timeout (default: 30)
/// - `RESEND_WEBHOOK_TIMEOUT_SECS`: Timeout for workflow webhooks (default: 10)
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Provider API key
    #[serde(default)]
    pub api_key: String,

    /// Provider API base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sender used when neither the step nor the site configures one
    #[serde(default = "default_from")]
    pub default_from: String,

    /// Email request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Webhook request timeout in seconds
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.resend.com".to_string()
}

fn default_from() -> String {
    "notifications@creatorhub.app".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_webhook_timeout() -> u64 {
    10
}

impl DeliveryConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("RESEND_").from_env::<DeliveryConfig>()
    }

    /// Whether an API key has been provided.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            default_from: default_from(),
            timeout_secs: default_timeout(),
            webhook_timeout_secs: default_webhook_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DeliveryConfig::default();
        assert_eq!(config.base_url, "https://api.resend.com");
        assert_eq!(config.webhook_timeout_secs, 10);
        assert!(!config.has_api_key());
    }
}
