//! Mandate request domain models
//!
//! A mandate request tracks one attempt to get a customer to authorise
//! recurring debits. Its status only ever moves forward:
//! `pending -> sent -> {signed, declined, expired}`, with `failed`
//! reachable from `pending` or `sent` when submission breaks.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::audit::AuditEntry;
use crate::domain::notification::NotificationTracking;
use crate::domain::payment_method::BankAccountDetails;

/// Status of a mandate request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MandateStatus {
    Pending,
    Sent,
    Signed,
    Declined,
    Expired,
    Failed,
}

impl MandateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MandateStatus::Pending => "pending",
            MandateStatus::Sent => "sent",
            MandateStatus::Signed => "signed",
            MandateStatus::Declined => "declined",
            MandateStatus::Expired => "expired",
            MandateStatus::Failed => "failed",
        }
    }

    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MandateStatus::Signed | MandateStatus::Declined | MandateStatus::Expired | MandateStatus::Failed
        )
    }

    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(&self, next: MandateStatus) -> bool {
        use MandateStatus::*;
        matches!(
            (self, next),
            (Pending, Sent)
                | (Pending, Failed)
                | (Pending, Expired)
                | (Sent, Signed)
                | (Sent, Declined)
                | (Sent, Expired)
                | (Sent, Failed)
        )
    }
}

/// Debit frequency codes used by the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DebitFrequency {
    #[default]
    Monthly,
    Bimonthly,
    Quarterly,
    SixMonthly,
    Annually,
    Weekly,
    Biweekly,
}

impl DebitFrequency {
    pub fn gateway_code(&self) -> u8 {
        match self {
            DebitFrequency::Monthly => 1,
            DebitFrequency::Bimonthly => 2,
            DebitFrequency::Quarterly => 3,
            DebitFrequency::SixMonthly => 4,
            DebitFrequency::Annually => 5,
            DebitFrequency::Weekly => 6,
            DebitFrequency::Biweekly => 7,
        }
    }
}

/// Date the first debit may run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Commencement {
    pub month: u32,
    pub day: u8,
}

impl Commencement {
    /// First debit happens in the calendar month after `today` on the
    /// requested billing day. Days outside `allowed_days` fall back to the 1st.
    pub fn next_month(today: NaiveDate, requested_day: u8, allowed_days: &[u8]) -> Self {
        let day = if allowed_days.contains(&requested_day) {
            requested_day
        } else {
            1
        };
        let month = if today.month() == 12 { 1 } else { today.month() + 1 };
        Self { month, day }
    }

    /// Two-digit day as written into batch files
    pub fn padded_day(&self) -> String {
        format!("{:02}", self.day)
    }

    pub fn padded_month(&self) -> String {
        format!("{:02}", self.month)
    }
}

/// Exact mandate record sent to the gateway, kept for audit and replay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MandateBatchRequest {
    pub account_reference: String,
    pub mandate_name: String,
    pub mandate_amount: Decimal,
    pub is_consumer: bool,
    pub first_name: String,
    pub surname: String,
    pub mobile_number: String,
    pub email_address: Option<String>,
    pub debit_frequency: DebitFrequency,
    pub commencement: Commencement,
    pub agreement_date: NaiveDate,
    /// Caller correlation reference, normally the order number
    pub agreement_reference: String,
    pub send_mandate: bool,
    /// 1 = next business day
    pub public_holiday_option: u8,
    pub bank_details: Option<BankAccountDetails>,
    /// Passthrough: order id
    pub field1: Option<String>,
    /// Passthrough: order number
    pub field2: Option<String>,
    /// Passthrough: customer id
    pub field3: Option<String>,
}

/// Stored mandate request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateRequest {
    pub id: Uuid,
    pub payment_method_id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub status: MandateStatus,
    pub netcash_account_reference: String,
    pub billing_day: u8,
    pub mandate_amount: Decimal,
    pub mandate_frequency: DebitFrequency,
    pub request_payload: MandateBatchRequest,
    pub file_token: Option<String>,
    pub response_code: Option<String>,
    pub error_messages: Vec<String>,
    pub signed_document_url: Option<String>,
    pub notification: NotificationTracking,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub audit: Vec<AuditEntry>,
}

impl MandateRequest {
    /// Unsigned request whose signing window has closed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now > self.expires_at
    }
}

/// Inbound mandate postback.
///
/// Field names follow the gateway's form keys; everything except the
/// account reference and the outcome flags is optional because the gateway
/// omits empty values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct MandatePostback {
    pub mandate_successful: String,
    #[serde(default)]
    pub is_declined: Option<String>,
    #[serde(default)]
    pub reason_for_decline: Option<String>,
    pub account_ref: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub bank_account_name: Option<String>,
    /// Usually masked by the gateway, e.g. `321*****7`
    #[serde(default)]
    pub bank_account_no: Option<String>,
    #[serde(default)]
    pub branch_code: Option<String>,
    #[serde(default)]
    pub bank_account_type: Option<String>,
    #[serde(default, rename = "MandatePDFLink")]
    pub mandate_pdf_link: Option<String>,
    #[serde(default)]
    pub field1: Option<String>,
    #[serde(default)]
    pub field2: Option<String>,
    #[serde(default)]
    pub field3: Option<String>,
}

/// What a postback asks the reconciler to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostbackOutcome {
    Signed,
    Declined,
}

impl PostbackOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostbackOutcome::Signed => "signed",
            PostbackOutcome::Declined => "declined",
        }
    }
}

impl MandatePostback {
    /// Signed only when the gateway says successful and not declined
    pub fn outcome(&self) -> PostbackOutcome {
        let declined = self.is_declined.as_deref() == Some("1");
        if self.mandate_successful == "1" && !declined {
            PostbackOutcome::Signed
        } else {
            PostbackOutcome::Declined
        }
    }

    /// Bank record carried by a signed postback, if complete enough to mask
    pub fn bank_details(&self) -> Option<BankAccountDetails> {
        let bank_name = self.bank_name.clone().filter(|s| !s.trim().is_empty())?;
        let account_number = self.bank_account_no.clone().filter(|s| !s.trim().is_empty())?;
        Some(BankAccountDetails {
            bank_name,
            account_holder: self.bank_account_name.clone().unwrap_or_default(),
            account_number,
            branch_code: self.branch_code.clone().unwrap_or_default(),
            account_type: crate::domain::payment_method::BankAccountType::parse_lenient(
                self.bank_account_type.as_deref().unwrap_or("current"),
            ),
        })
    }
}
