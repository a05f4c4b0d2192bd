//! Payment method store: encrypted storage, masked reads, single primary

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::payment_method::{
    mask_details, EncryptedBlob, PaymentDetails, PaymentMethod, PaymentMethodDisplay, PaymentMethodStatus, PaymentMethodType,
    StoredDetails,
};
use crate::infrastructure::adapters::{BillingRepository, Encryptor};
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPaymentMethodRequest {
    pub method_type: PaymentMethodType,
    pub details: PaymentDetails,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub mandate_id: Option<Uuid>,
}

pub struct PaymentMethodStore {
    repo: Arc<dyn BillingRepository>,
    encryptor: Encryptor,
}

impl PaymentMethodStore {
    pub fn new(repo: Arc<dyn BillingRepository>, encryptor: Encryptor) -> Self {
        Self { repo, encryptor }
    }

    /// Encrypt a record for storage. Cipher errors never reach the caller in detail.
    pub fn seal(&self, details: &PaymentDetails) -> AppResult<StoredDetails> {
        self.seal_blob(details).map(StoredDetails::Encrypted)
    }

    fn seal_blob(&self, details: &PaymentDetails) -> AppResult<EncryptedBlob> {
        self.encryptor.encrypt(details).map_err(|e| {
            warn!(error = %e, "Failed to encrypt payment details");
            AppError::Encryption
        })
    }

    /// Store a new method and return its masked view
    pub async fn add(&self, customer_id: Uuid, request: AddPaymentMethodRequest) -> AppResult<PaymentMethodDisplay> {
        request.details.validate()?;
        let label = mask_details(request.method_type, &request.details)?;
        let encrypted_details = self.seal(&request.details)?;

        let now = Utc::now();
        let status = match request.method_type {
            PaymentMethodType::DebitOrder => PaymentMethodStatus::Pending,
            PaymentMethodType::Card | PaymentMethodType::Eft => PaymentMethodStatus::Active,
        };
        let method = PaymentMethod {
            id: Uuid::new_v4(),
            customer_id,
            order_id: None,
            method_type: request.method_type,
            display_name: label.display_name,
            last_four: label.last_four,
            encrypted_details,
            is_primary: request.is_primary,
            is_active: true,
            status,
            mandate_id: request.mandate_id,
            mandate_status: None,
            netcash_account_reference: None,
            mandate_active: false,
            mandate_signed_at: None,
            file_token: None,
            created_at: now,
            updated_at: now,
        };

        let stored = self
            .repo
            .insert_payment_method(method)
            .await
            .map_err(|e| context("insert payment method", e))?;
        info!(
            customer_id = %customer_id,
            method_id = %stored.id,
            method_type = stored.method_type.as_str(),
            is_primary = stored.is_primary,
            "Payment method added"
        );
        Ok(stored.to_display())
    }

    pub async fn set_primary(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<PaymentMethodDisplay> {
        let method = self
            .repo
            .set_primary_payment_method(customer_id, method_id)
            .await
            .map_err(|e| context("set primary payment method", e))?;
        info!(customer_id = %customer_id, method_id = %method_id, "Primary payment method changed");
        Ok(method.to_display())
    }

    /// Soft delete. The primary method cannot go while a balance is owed,
    /// and removing it never promotes another method.
    pub async fn remove(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<()> {
        let removed = self
            .repo
            .remove_payment_method(customer_id, method_id)
            .await
            .map_err(|e| context("remove payment method", e))?;
        info!(customer_id = %customer_id, method_id = %removed.id, "Payment method removed");
        Ok(())
    }

    pub async fn list(&self, customer_id: Uuid) -> AppResult<Vec<PaymentMethodDisplay>> {
        let methods = self
            .repo
            .list_payment_methods(customer_id)
            .await
            .map_err(|e| context("list payment methods", e))?;
        Ok(methods.iter().map(PaymentMethod::to_display).collect())
    }

    pub async fn get_primary(&self, customer_id: Uuid) -> AppResult<PaymentMethodDisplay> {
        self.list(customer_id)
            .await?
            .into_iter()
            .find(|m| m.is_primary)
            .ok_or_else(|| AppError::NotFound(format!("primary payment method for customer {}", customer_id)))
    }

    /// Decrypt a method's full record for collection.
    ///
    /// Legacy plaintext rows are accepted once, then rewritten encrypted.
    pub async fn load_details(&self, customer_id: Uuid, method_id: Uuid) -> AppResult<PaymentDetails> {
        let method = self
            .repo
            .get_payment_method(method_id)
            .await
            .map_err(|e| context("load payment method", e))?
            .filter(|m| m.customer_id == customer_id && m.is_active)
            .ok_or_else(|| AppError::NotFound(format!("payment method {}", method_id)))?;

        match &method.encrypted_details {
            StoredDetails::Encrypted(blob) => self.encryptor.decrypt(blob).inspect_err(|_| {
                LoggingUtils::log_integrity_incident(
                    "payment_details_decryption_failed",
                    "stored ciphertext failed authentication",
                    &method.id.to_string(),
                );
            }),
            StoredDetails::Legacy(value) => {
                warn!(method_id = %method.id, "Payment method holds unencrypted legacy details");
                let details: PaymentDetails =
                    serde_json::from_value(value.clone()).map_err(|_| AppError::Decryption)?;
                let blob = self.seal_blob(&details)?;
                let resealed = self
                    .repo
                    .reseal_legacy_details(method.id, blob, Utc::now())
                    .await
                    .map_err(|e| context("re-encrypt legacy payment method", e))?;
                if !resealed {
                    warn!(method_id = %method.id, "Legacy payment details were replaced before re-encryption");
                }
                Ok(details)
            }
        }
    }

    /// Primary method and its record, refused unless a live collection is allowed
    pub async fn resolve_collection_method(&self, customer_id: Uuid) -> AppResult<(PaymentMethodDisplay, PaymentDetails)> {
        let primary = self
            .repo
            .list_payment_methods(customer_id)
            .await
            .map_err(|e| context("list payment methods", e))?
            .into_iter()
            .find(|m| m.is_primary)
            .ok_or_else(|| AppError::NotFound(format!("primary payment method for customer {}", customer_id)))?;

        if !primary.is_collectable() {
            return Err(AppError::Validation(
                "Primary payment method is not authorised for collection".to_string(),
            ));
        }
        let details = self.load_details(customer_id, primary.id).await?;
        Ok((primary.to_display(), details))
    }
}

/// Wrap storage failures with the operation; domain errors pass through
pub(crate) fn context(operation: &str, err: AppError) -> AppError {
    match err {
        AppError::Storage(msg) => AppError::storage(operation, msg),
        AppError::Internal(msg) => AppError::storage(operation, msg),
        other => other,
    }
}
