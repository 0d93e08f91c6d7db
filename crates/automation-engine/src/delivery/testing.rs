//! Recording fakes for delivery traits.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, AppResult};

use super::{
    EmailMessage, EmailReceipt, EmailSender, WebhookDispatcher, WebhookRequest, WebhookResponse,
};

/// Records every email; optionally fails every send.
#[derive(Default)]
pub struct RecordingEmailSender {
    pub sent: Mutex<Vec<EmailMessage>>,
    pub fail_with: Option<String>,
}

impl RecordingEmailSender {
    pub fn failing(message: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> AppResult<EmailReceipt> {
        if let Some(err) = &self.fail_with {
            return Err(AppError::Delivery(err.clone()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(message.clone());
        Ok(EmailReceipt {
            id: format!("msg_{}", sent.len()),
        })
    }
}

/// Records every webhook and answers with a fixed status.
pub struct RecordingWebhookDispatcher {
    pub requests: Mutex<Vec<WebhookRequest>>,
    pub status: u16,
}

impl Default for RecordingWebhookDispatcher {
    fn default() -> Self {
        Self::with_status(200)
    }
}

impl RecordingWebhookDispatcher {
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            status,
        }
    }

    pub fn requests(&self) -> Vec<WebhookRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookDispatcher for RecordingWebhookDispatcher {
    async fn dispatch(&self, request: &WebhookRequest) -> AppResult<WebhookResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(WebhookResponse {
            status: self.status,
            body: "{\"ok\":true}".to_string(),
        })
    }
}
