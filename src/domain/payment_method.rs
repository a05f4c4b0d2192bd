//! Payment method domain models and masking rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::mandate::MandateStatus;
use crate::shared::error::{AppError, AppResult};
use crate::shared::validation::ValidationUtils;

/// Kind of payment method a customer can register
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodType {
    DebitOrder,
    Card,
    Eft,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::DebitOrder => "debit_order",
            PaymentMethodType::Card => "card",
            PaymentMethodType::Eft => "eft",
        }
    }
}

impl std::str::FromStr for PaymentMethodType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debit_order" | "bank_account" => Ok(PaymentMethodType::DebitOrder),
            "card" => Ok(PaymentMethodType::Card),
            "eft" => Ok(PaymentMethodType::Eft),
            _ => Err(AppError::Validation(format!("unsupported payment method type: {}", s))),
        }
    }
}

/// Lifecycle of a stored payment method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodStatus {
    /// Waiting on the customer to sign a mandate
    Pending,
    Active,
    Failed,
    Expired,
}

/// Bank account type as the gateway understands it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BankAccountType {
    Current,
    Savings,
    Transmission,
}

impl BankAccountType {
    /// Numeric code used in batch files
    pub fn gateway_code(&self) -> u8 {
        match self {
            BankAccountType::Current => 1,
            BankAccountType::Savings => 2,
            BankAccountType::Transmission => 3,
        }
    }

    /// Parse the loose spellings customers and the gateway use
    pub fn parse_lenient(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "savings" => BankAccountType::Savings,
            "transmission" => BankAccountType::Transmission,
            _ => BankAccountType::Current,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankAccountDetails {
    pub bank_name: String,
    pub account_holder: String,
    pub account_number: String,
    pub branch_code: String,
    pub account_type: BankAccountType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDetails {
    /// Card scheme, e.g. "visa"
    pub card_type: String,
    pub holder_name: String,
    /// Card number or gateway token
    pub card_number: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EftDetails {
    /// Reference the customer quotes on manual transfers
    pub payment_reference: Option<String>,
}

/// Full structured record kept encrypted at rest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentDetails {
    Bank(BankAccountDetails),
    Card(CardDetails),
    Eft(EftDetails),
}

impl PaymentDetails {
    /// Method type this record belongs to
    pub fn method_type(&self) -> PaymentMethodType {
        match self {
            PaymentDetails::Bank(_) => PaymentMethodType::DebitOrder,
            PaymentDetails::Card(_) => PaymentMethodType::Card,
            PaymentDetails::Eft(_) => PaymentMethodType::Eft,
        }
    }

    /// Reject records that cannot be masked or collected against
    pub fn validate(&self) -> AppResult<()> {
        match self {
            PaymentDetails::Bank(bank) => {
                if bank.bank_name.trim().is_empty() {
                    return Err(AppError::Validation("bank name is required".into()));
                }
                if ValidationUtils::last_four(&bank.account_number).is_none() {
                    return Err(AppError::Validation("account number is required".into()));
                }
                ValidationUtils::validate_branch_code(&bank.branch_code)
            }
            PaymentDetails::Card(card) => {
                if ValidationUtils::last_four(&card.card_number).is_none() {
                    return Err(AppError::Validation("card number is required".into()));
                }
                if !(1..=12).contains(&card.expiry_month) {
                    return Err(AppError::Validation("card expiry month must be 1-12".into()));
                }
                Ok(())
            }
            PaymentDetails::Eft(_) => Ok(()),
        }
    }
}

/// Human-safe label derived from a payment record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedLabel {
    pub display_name: String,
    pub last_four: Option<String>,
}

/// Fixed label for EFT methods
pub const EFT_DISPLAY_NAME: &str = "EFT / Bank Transfer";

/// Label shown while a mandate is still waiting for the customer's bank details
pub const PENDING_MANDATE_DISPLAY_NAME: &str = "Debit Order - Awaiting Mandate";

/// Derive the display label for a method.
///
/// Pure: the result depends only on the method type and the record.
pub fn mask_details(method_type: PaymentMethodType, details: &PaymentDetails) -> AppResult<MaskedLabel> {
    match (method_type, details) {
        (PaymentMethodType::DebitOrder, PaymentDetails::Bank(bank)) => {
            let last_four = ValidationUtils::last_four(&bank.account_number).unwrap_or_default();
            Ok(MaskedLabel {
                display_name: format!("Debit Order - {} ***{}", bank.bank_name.trim(), last_four),
                last_four: Some(last_four),
            })
        }
        (PaymentMethodType::Card, PaymentDetails::Card(card)) => {
            let last_four = ValidationUtils::last_four(&card.card_number).unwrap_or_default();
            Ok(MaskedLabel {
                display_name: format!("{} Card ***{}", card.card_type.trim().to_uppercase(), last_four),
                last_four: Some(last_four),
            })
        }
        (PaymentMethodType::Eft, PaymentDetails::Eft(_)) => Ok(MaskedLabel {
            display_name: EFT_DISPLAY_NAME.to_string(),
            last_four: None,
        }),
        (expected, other) => Err(AppError::Validation(format!(
            "payment details of type {} do not match method type {}",
            other.method_type().as_str(),
            expected.as_str()
        ))),
    }
}

/// AES-GCM output persisted alongside the method.
///
/// Nonce, ciphertext and tag are stored together and base64 encoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub version: u8,
    pub nonce: String,
    pub ciphertext: String,
    pub tag: String,
}

/// What is actually in the `encrypted_details` column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StoredDetails {
    Encrypted(EncryptedBlob),
    /// Rows written before encryption was introduced
    Legacy(serde_json::Value),
}

/// Stored payment method row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub order_id: Option<Uuid>,
    pub method_type: PaymentMethodType,
    pub display_name: String,
    pub last_four: Option<String>,
    pub encrypted_details: StoredDetails,
    pub is_primary: bool,
    pub is_active: bool,
    pub status: PaymentMethodStatus,
    pub mandate_id: Option<Uuid>,
    pub mandate_status: Option<MandateStatus>,
    pub netcash_account_reference: Option<String>,
    pub mandate_active: bool,
    pub mandate_signed_at: Option<DateTime<Utc>>,
    pub file_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    /// Whether a live collection may be started against this method
    pub fn is_collectable(&self) -> bool {
        if !self.is_active || self.status != PaymentMethodStatus::Active {
            return false;
        }
        match self.method_type {
            PaymentMethodType::DebitOrder => self.mandate_active && self.mandate_signed_at.is_some(),
            PaymentMethodType::Card | PaymentMethodType::Eft => true,
        }
    }

    /// Masked projection safe to return to callers
    pub fn to_display(&self) -> PaymentMethodDisplay {
        PaymentMethodDisplay {
            id: self.id,
            method_type: self.method_type,
            display_name: self.display_name.clone(),
            last_four: self.last_four.clone(),
            is_primary: self.is_primary,
            status: self.status,
            mandate_status: self.mandate_status,
            mandate_active: self.mandate_active,
            created_at: self.created_at,
        }
    }
}

/// Masked payment method as returned by every read path
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodDisplay {
    pub id: Uuid,
    pub method_type: PaymentMethodType,
    pub display_name: String,
    pub last_four: Option<String>,
    pub is_primary: bool,
    pub status: PaymentMethodStatus,
    pub mandate_status: Option<MandateStatus>,
    pub mandate_active: bool,
    pub created_at: DateTime<Utc>,
}
