//! Delivery implementations that only log, for `run-once --dry-run`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;

use super::{
    EmailMessage, EmailReceipt, EmailSender, WebhookDispatcher, WebhookRequest, WebhookResponse,
};

/// Logs emails instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct DryRunEmailSender;

#[async_trait]
impl EmailSender for DryRunEmailSender {
    async fn send(&self, message: &EmailMessage) -> AppResult<EmailReceipt> {
        tracing::info!(to = ?message.to, subject = %message.subject, "Dry run: email not sent");
        Ok(EmailReceipt {
            id: format!("dry-run-{}", Uuid::new_v4()),
        })
    }
}

/// Logs webhooks instead of calling them.
#[derive(Debug, Default, Clone)]
pub struct DryRunWebhookDispatcher;

#[async_trait]
impl WebhookDispatcher for DryRunWebhookDispatcher {
    async fn dispatch(&self, request: &WebhookRequest) -> AppResult<WebhookResponse> {
        tracing::info!(url = %request.url, method = ?request.method, "Dry run: webhook not sent");
        Ok(WebhookResponse {
            status: 200,
            body: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::HttpMethod;
    use std::collections::HashMap;

    #[test]
    fn test_dry_run_email_returns_synthetic_id() {
        let message = EmailMessage {
            from: "hi@shop.test".to_string(),
            to: vec!["ada@example.com".to_string()],
            subject: "Hi".to_string(),
            html: "<p>Hi</p>".to_string(),
            reply_to: None,
        };
        let receipt = tokio_test::block_on(DryRunEmailSender.send(&message)).unwrap();
        assert!(receipt.id.starts_with("dry-run-"));
    }

    #[test]
    fn test_dry_run_webhook_succeeds() {
        let request = WebhookRequest {
            url: "https://hooks.example.com".to_string(),
            method: HttpMethod::POST,
            headers: HashMap::new(),
            payload: serde_json::json!({}),
        };
        let response = tokio_test::block_on(DryRunWebhookDispatcher.dispatch(&request)).unwrap();
        assert!(response.is_success());
    }
}
