//! Customer, order and invoice records the core reads and mutates
//!
//! These are owned by the wider billing system; only the fields the
//! mandate and fallback flows depend on are modelled.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::audit::AuditEntry;
use crate::domain::notification::Channel;
use crate::domain::payment_method::PaymentMethod;
use crate::shared::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Consumer,
    Business,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Gateway account reference; required before a mandate can be requested
    pub account_number: Option<String>,
    pub account_type: AccountType,
    /// Outstanding amount in rands
    pub balance: Decimal,
    /// Billing-default pointer, mirrors the primary method
    pub billing_default_method_id: Option<Uuid>,
}

impl Customer {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PaymentMethodPending,
    PaymentMethodRegistered,
    Active,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Overdue,
}

/// Annotation left on an invoice when a scheduled collection fails
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionFailure {
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub status: InvoiceStatus,
    /// Outstanding amount in rands
    pub amount: Decimal,
    pub payment_method_id: Option<Uuid>,
    pub collection_failures: Vec<CollectionFailure>,
    pub paynow_url: Option<String>,
    pub paynow_transaction_ref: Option<String>,
    pub paynow_sent_at: Option<DateTime<Utc>>,
    pub paynow_sent_via: Vec<Channel>,
    pub paid_at: Option<DateTime<Utc>>,
    pub audit: Vec<AuditEntry>,
}

/// Request for a one-time hosted payment link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayNowRequest {
    /// `{invoice_number}-{unix_seconds}`
    pub transaction_reference: String,
    pub amount: Decimal,
    pub description: String,
    pub invoice_id: Uuid,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
}

impl PayNowRequest {
    pub fn transaction_reference_for(invoice_number: &str, at: DateTime<Utc>) -> String {
        format!("{}-{}", invoice_number, at.timestamp())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayNowLink {
    pub url: String,
    pub transaction_reference: String,
}

/// Inbound Pay Now settlement notice
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PayNowNotice {
    pub transaction_accepted: String,
    /// Settled amount in cents
    pub amount: String,
    /// Transaction reference issued with the link
    pub reference: String,
    /// Invoice id passthrough
    #[serde(default)]
    pub extra1: Option<String>,
    #[serde(default)]
    pub request_trace: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl PayNowNotice {
    /// Only the exact literal `true` counts as accepted
    pub fn is_accepted(&self) -> bool {
        self.transaction_accepted == "true"
    }

    /// Amount in rands
    pub fn amount_rands(&self) -> AppResult<Decimal> {
        let cents: i64 = self
            .amount
            .trim()
            .parse()
            .map_err(|_| AppError::Validation(format!("invalid amount: {}", self.amount)))?;
        Ok(Decimal::new(cents, 2))
    }
}

/// Result of settling an invoice by transaction reference
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    Settled(Invoice),
    AlreadyPaid,
    UnknownReference,
    AmountMismatch { expected: Decimal, received: Decimal },
}

/// Removal rule: the primary method stays while money is owed.
pub fn check_removal(method: &PaymentMethod, customer: &Customer) -> AppResult<()> {
    if method.is_primary && customer.balance > Decimal::ZERO {
        return Err(AppError::PrimaryMethodInUse {
            method_id: method.id.to_string(),
        });
    }
    Ok(())
}

/// Amounts on the wire are integer cents
pub fn to_cents(amount: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    (amount.round_dp(2) * Decimal::ONE_HUNDRED).to_i64().unwrap_or_default()
}
