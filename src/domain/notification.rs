//! Notification payloads and delivery tracking

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outbound delivery channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

/// Fixed SMS wordings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SmsTemplate {
    PaymentDue,
    PaymentReminder,
    DebitFailed,
    EmandatePending,
}

impl SmsTemplate {
    pub fn render(&self, name: &str, invoice_number: &str, amount: Decimal, url: &str) -> String {
        let amount = amount.round_dp(2);
        match self {
            SmsTemplate::PaymentDue => format!(
                "Hi {}, your invoice {} for R{:.2} is due today. Pay now: {}",
                name, invoice_number, amount, url
            ),
            SmsTemplate::PaymentReminder => format!(
                "Reminder: Your invoice {} (R{:.2}) is due. Pay securely: {}",
                invoice_number, amount, url
            ),
            SmsTemplate::DebitFailed => format!(
                "Hi {}, your debit order for invoice {} (R{:.2}) could not be processed. Please pay here: {}",
                name, invoice_number, amount, url
            ),
            SmsTemplate::EmandatePending => format!(
                "Hi {}, your invoice {} (R{:.2}) is due. Your debit order is not yet active. Pay now: {}",
                name, invoice_number, amount, url
            ),
        }
    }

    /// Email template paired with this SMS wording
    pub fn email_template(&self) -> &'static str {
        match self {
            SmsTemplate::PaymentDue => "payment_due",
            SmsTemplate::PaymentReminder => "payment_reminder",
            SmsTemplate::DebitFailed => "debit_failed",
            SmsTemplate::EmandatePending => "emandate_pending",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub template: String,
    pub subject: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SmsMessage {
    pub to: String,
    pub text: String,
}

/// Result of one channel call. A failed channel is data, not an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeliveryResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(message_id: Option<String>) -> Self {
        Self {
            success: true,
            message_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Delivery bookkeeping written back by notification collaborators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NotificationTracking {
    pub channel: Option<Channel>,
    pub provider_message_id: Option<String>,
    pub delivery_status: Option<String>,
    pub error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationTracking {
    pub fn record(channel: Channel, result: &DeliveryResult, at: DateTime<Utc>) -> Self {
        Self {
            channel: Some(channel),
            provider_message_id: result.message_id.clone(),
            delivery_status: Some(if result.success { "sent" } else { "failed" }.to_string()),
            error: result.error.clone(),
            sent_at: Some(at),
        }
    }
}
