//! Email send log model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of an email send attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmailSendStatus {
    Sent,
    Failed,
}

impl std::fmt::Display for EmailSendStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EmailSendStatus::Sent => "sent",
            EmailSendStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Row to insert into `email_sends`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmailSend {
    pub site_id: Uuid,
    pub contact_id: Uuid,
    pub enrollment_id: Option<Uuid>,
    pub subject: String,
    pub status: EmailSendStatus,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}
