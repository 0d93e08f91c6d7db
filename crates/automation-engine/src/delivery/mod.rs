//! Outbound side effects of workflow steps.
//!
//! Email delivery and webhooks are external services; the engine only sees
//! the [`EmailSender`] and [`WebhookDispatcher`] traits.

pub mod dry_run;
pub mod resend;
pub mod webhook;

#[cfg(test)]
pub mod testing;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

pub use dry_run::{DryRunEmailSender, DryRunWebhookDispatcher};
pub use resend::ResendClient;
pub use webhook::HttpWebhookDispatcher;

/// A rendered email ready for delivery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

/// Provider acknowledgement of an accepted email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailReceipt {
    pub id: String,
}

/// Sends transactional email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> AppResult<EmailReceipt>;
}

/// HTTP method for webhook steps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
#[allow(clippy::upper_case_acronyms)]
pub enum HttpMethod {
    GET,
    #[default]
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::GET => reqwest::Method::GET,
            HttpMethod::POST => reqwest::Method::POST,
            HttpMethod::PUT => reqwest::Method::PUT,
            HttpMethod::PATCH => reqwest::Method::PATCH,
            HttpMethod::DELETE => reqwest::Method::DELETE,
        }
    }
}

/// A rendered webhook call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    pub payload: serde_json::Value,
}

/// What came back from a webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Calls user-configured webhook endpoints.
#[async_trait]
pub trait WebhookDispatcher: Send + Sync {
    async fn dispatch(&self, request: &WebhookRequest) -> AppResult<WebhookResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_method_default_and_serde() {
        assert_eq!(HttpMethod::default(), HttpMethod::POST);
        let method: HttpMethod = serde_json::from_str("\"PATCH\"").unwrap();
        assert_eq!(method, HttpMethod::PATCH);
    }

    #[test]
    fn test_webhook_response_success_range() {
        let ok = WebhookResponse { status: 204, body: String::new() };
        let redirect = WebhookResponse { status: 302, body: String::new() };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }
}
