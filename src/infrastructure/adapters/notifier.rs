//! Email and SMS delivery over provider HTTP APIs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::app_config::NotificationConfig;
use crate::domain::notification::{DeliveryResult, EmailMessage, SmsMessage};
use crate::shared::error::{AppError, AppResult};

/// Outbound notification channels.
///
/// Each call reports its own outcome; a failed channel is returned as a
/// `DeliveryResult` rather than an error so callers can keep going.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> DeliveryResult;
    async fn send_sms(&self, message: &SmsMessage) -> DeliveryResult;
}

pub struct HttpNotifier {
    config: Arc<NotificationConfig>,
    client: Client,
}

impl HttpNotifier {
    pub fn new(config: Arc<NotificationConfig>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    async fn post(&self, url: &str, api_key: &str, payload: &Value, id_field: &str) -> DeliveryResult {
        let response = match self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return DeliveryResult::failed(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return DeliveryResult::failed(format!("provider returned {}", status));
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message_id = body
            .pointer(id_field)
            .and_then(Value::as_str)
            .map(str::to_string);
        DeliveryResult::delivered(message_id)
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_email(&self, message: &EmailMessage) -> DeliveryResult {
        let payload = json!({
            "from": self.config.email_from,
            "to": [message.to],
            "subject": message.subject,
            "template": message.template,
            "data": message.data,
        });
        let result = self
            .post(&self.config.email_api_url, &self.config.email_api_key, &payload, "/id")
            .await;
        if result.success {
            debug!(template = %message.template, "Email accepted by provider");
        } else {
            warn!(template = %message.template, error = ?result.error, "Email delivery failed");
        }
        result
    }

    async fn send_sms(&self, message: &SmsMessage) -> DeliveryResult {
        let payload = json!({
            "to": [message.to],
            "content": message.text,
        });
        let result = self
            .post(&self.config.sms_api_url, &self.config.sms_api_key, &payload, "/messages/0/apiMessageId")
            .await;
        if !result.success {
            warn!(error = ?result.error, "SMS delivery failed");
        }
        result
    }
}
