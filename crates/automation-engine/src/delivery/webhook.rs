//! HTTP webhook dispatcher.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::DeliveryConfig;
use crate::error::AppResult;

use super::resend::truncate;
use super::{HttpMethod, WebhookDispatcher, WebhookRequest, WebhookResponse};

/// Longest response body kept in the step result.
const MAX_BODY: usize = 2048;

/// Sends webhook requests with reqwest.
#[derive(Clone)]
pub struct HttpWebhookDispatcher {
    client: reqwest::Client,
}

impl HttpWebhookDispatcher {
    pub fn new(config: &DeliveryConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.webhook_timeout_secs))
            .user_agent(concat!("creatorhub-automation/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookDispatcher for HttpWebhookDispatcher {
    async fn dispatch(&self, request: &WebhookRequest) -> AppResult<WebhookResponse> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url);

        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        builder = match request.method {
            HttpMethod::GET | HttpMethod::DELETE => builder,
            _ => builder.json(&request.payload),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();

        tracing::debug!(url = %request.url, status, "Webhook dispatched");

        Ok(WebhookResponse {
            status,
            body: truncate(&body, MAX_BODY).to_string(),
        })
    }
}
