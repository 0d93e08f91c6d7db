//! Resend email API client.
//!
//! Contract: `POST {base_url}/emails` with a bearer API key and a JSON body
//! `{from, to, subject, html, reply_to?}`; a 2xx response carries `{"id": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::DeliveryConfig;
use crate::error::{AppError, AppResult};

use super::{EmailMessage, EmailReceipt, EmailSender};

/// Longest provider error body kept in error messages.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: String,
}

/// HTTP client for the Resend API.
#[derive(Clone)]
pub struct ResendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ResendClient {
    /// Create a client from delivery configuration.
    pub fn new(config: &DeliveryConfig) -> AppResult<Self> {
        if !config.has_api_key() {
            return Err(AppError::Config("RESEND_API_KEY is not set".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/emails", self.base_url)
    }
}

#[async_trait]
impl EmailSender for ResendClient {
    async fn send(&self, message: &EmailMessage) -> AppResult<EmailReceipt> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!(
                "Email provider returned {}: {}",
                status,
                truncate(&body, MAX_ERROR_BODY)
            )));
        }

        let parsed: SendResponse = response.json().await?;
        tracing::debug!(message_id = %parsed.id, to = ?message.to, "Email accepted by provider");

        Ok(EmailReceipt { id: parsed.id })
    }
}

/// Truncate on a char boundary.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let err = ResendClient::new(&DeliveryConfig::default());
        assert!(matches!(err, Err(AppError::Config(_))));
    }

    #[test]
    fn test_endpoint_trims_slash() {
        let config = DeliveryConfig {
            api_key: "re_test_key".to_string(),
            base_url: "http://localhost:9999/".to_string(),
            ..DeliveryConfig::default()
        };
        let client = ResendClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9999/emails");
    }

    #[test]
    fn test_truncate_char_boundary() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn test_message_wire_format() {
        let message = EmailMessage {
            from: "Shop <hi@shop.test>".to_string(),
            to: vec!["ada@example.com".to_string()],
            subject: "Welcome".to_string(),
            html: "<p>Hi</p>".to_string(),
            reply_to: None,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["to"][0], "ada@example.com");
        assert!(json.get("reply_to").is_none());
    }
}
