//! Typed audit trail entries for mandate requests and invoices

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::notification::Channel;

/// One recorded event and its metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub metadata: AuditMetadata,
}

impl AuditEntry {
    pub fn now(metadata: AuditMetadata) -> Self {
        Self { at: Utc::now(), metadata }
    }

    pub fn at(at: DateTime<Utc>, metadata: AuditMetadata) -> Self {
        Self { at, metadata }
    }
}

/// Metadata shapes, one per operation.
///
/// New variants may be added; readers must ignore kinds they don't know
/// by matching with a wildcard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditMetadata {
    MandateInitiated {
        order_number: String,
        payment_method_id: Uuid,
        mandate_amount: Decimal,
        billing_day: u8,
        notes: Option<String>,
    },
    MandateSubmitted {
        file_token: String,
    },
    MandateSubmissionFailed {
        code: String,
        message: String,
    },
    MandateSigned {
        bank_name: Option<String>,
        last_four: Option<String>,
        signed_document_url: Option<String>,
    },
    MandateDeclined {
        reason: Option<String>,
    },
    MandateExpired {
        expired_after: DateTime<Utc>,
    },
    PayNowIssued {
        transaction_reference: String,
        amount: Decimal,
        channels: Vec<Channel>,
    },
    PayNowSettled {
        transaction_reference: String,
        amount: Decimal,
    },
    CollectionFailed {
        reason: String,
    },
}
