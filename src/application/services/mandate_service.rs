//! Mandate request orchestration
//!
//! Turns an order into a gateway mandate request. The pending method and
//! the request are created together, submitted, then moved to `sent` or
//! `failed`; nothing is ever left pending after a failed submission.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::services::payment_method_service::{context, PaymentMethodStore};
use crate::config::app_config::MandateConfig;
use crate::domain::audit::{AuditEntry, AuditMetadata};
use crate::domain::auth::Caller;
use crate::domain::billing::{AccountType, Customer, Order, OrderStatus};
use crate::domain::mandate::{Commencement, DebitFrequency, MandateBatchRequest, MandateRequest, MandateStatus};
use crate::domain::notification::NotificationTracking;
use crate::domain::payment_method::{
    mask_details, BankAccountDetails, BankAccountType, PaymentDetails, PaymentMethod, PaymentMethodDisplay,
    PaymentMethodStatus, PaymentMethodType, PENDING_MANDATE_DISPLAY_NAME,
};
use crate::infrastructure::adapters::{
    AccountLock, BillingRepository, LoadReport, MandateGateway, MandateTransition, OrderUpdate,
};
use crate::shared::error::{AppError, AppResult};
use crate::shared::metrics::MetricsUtils;
use crate::shared::validation::ValidationUtils;

fn default_method_type() -> PaymentMethodType {
    PaymentMethodType::DebitOrder
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct InitiateMandateRequest {
    pub order_id: Uuid,
    pub mandate_amount: Decimal,
    #[serde(default = "default_method_type")]
    pub payment_method_type: PaymentMethodType,
    #[serde(default)]
    pub debit_frequency: DebitFrequency,
    #[validate(range(min = 1, max = 31))]
    pub debit_day: u8,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    /// Bank account captured up front; otherwise the customer enters it while signing
    #[serde(default)]
    pub bank_details: Option<BankAccountDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiateMandateResponse {
    pub mandate_request_id: Uuid,
    pub payment_method_id: Uuid,
    pub account_reference: String,
    pub signing_url: String,
    pub file_token: String,
    pub status: MandateStatus,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MandateStatusView {
    pub mandate_request_id: Uuid,
    pub order_id: Uuid,
    pub status: MandateStatus,
    pub account_reference: String,
    pub billing_day: u8,
    pub mandate_amount: Decimal,
    pub expires_at: DateTime<Utc>,
    pub file_token: Option<String>,
    pub signed_document_url: Option<String>,
    pub error_messages: Vec<String>,
    pub payment_method: Option<PaymentMethodDisplay>,
}

pub struct MandateOrchestrator {
    config: Arc<MandateConfig>,
    repo: Arc<dyn BillingRepository>,
    store: Arc<PaymentMethodStore>,
    gateway: Arc<dyn MandateGateway>,
    lock: AccountLock,
    metrics: MetricsUtils,
}

impl MandateOrchestrator {
    pub fn new(
        config: Arc<MandateConfig>,
        repo: Arc<dyn BillingRepository>,
        store: Arc<PaymentMethodStore>,
        gateway: Arc<dyn MandateGateway>,
        lock: AccountLock,
        metrics: MetricsUtils,
    ) -> Self {
        Self {
            config,
            repo,
            store,
            gateway,
            lock,
            metrics,
        }
    }

    /// Customer-facing signing link for an order
    pub fn signing_url(&self, order_id: Uuid) -> String {
        format!(
            "{}/orders/{}/mandate",
            self.config.signing_url_base.trim_end_matches('/'),
            order_id
        )
    }

    /// Customers may only see and start mandates for their own orders.
    /// An unknown order is `NotFound` for every caller.
    pub async fn authorize_order(&self, caller: &Caller, order_id: Uuid) -> AppResult<()> {
        if caller.is_service() {
            return Ok(());
        }
        let order = self
            .repo
            .get_order(order_id)
            .await
            .map_err(|e| context("load order", e))?
            .ok_or_else(|| AppError::NotFound(format!("order {}", order_id)))?;
        caller.require_customer(order.customer_id)
    }

    pub async fn initiate(&self, request: InitiateMandateRequest) -> AppResult<InitiateMandateResponse> {
        request
            .validate()
            .map_err(|e| AppError::Validation(format!("Invalid mandate request: {}", e)))?;
        ValidationUtils::validate_amount(request.mandate_amount)?;
        if request.payment_method_type == PaymentMethodType::Eft {
            return Err(AppError::Validation("EFT cannot be used for a debit mandate".to_string()));
        }

        let order = self
            .repo
            .get_order(request.order_id)
            .await
            .map_err(|e| context("load order", e))?
            .ok_or_else(|| AppError::NotFound(format!("order {}", request.order_id)))?;
        let customer = self
            .repo
            .get_customer(order.customer_id)
            .await
            .map_err(|e| context("load customer", e))?
            .ok_or_else(|| AppError::NotFound(format!("customer {}", order.customer_id)))?;

        let reference = customer
            .account_number
            .clone()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Customer has no account reference assigned".to_string()))?;
        ValidationUtils::validate_account_reference(&reference)?;

        let guard = self.lock.acquire(&reference).await?;
        let result = self.initiate_locked(&request, &order, &customer, &reference).await;
        if let Err(e) = self.lock.release(guard).await {
            warn!(account_reference = %reference, error = %e, "Failed to release account lock");
        }
        result
    }

    async fn initiate_locked(
        &self,
        request: &InitiateMandateRequest,
        order: &Order,
        customer: &Customer,
        reference: &str,
    ) -> AppResult<InitiateMandateResponse> {
        let removed = self
            .repo
            .delete_unsigned_methods_for_reference(customer.id, reference)
            .await
            .map_err(|e| context("clean up unsigned payment methods", e))?;
        if removed > 0 {
            info!(account_reference = %reference, removed, "Cleaned up unsigned payment methods");
        }

        let now = Utc::now();
        let (display_name, last_four, details) = match &request.bank_details {
            Some(bank) => {
                let details = PaymentDetails::Bank(bank.clone());
                details.validate()?;
                let label = mask_details(PaymentMethodType::DebitOrder, &details)?;
                (label.display_name, label.last_four, details)
            }
            None => (
                PENDING_MANDATE_DISPLAY_NAME.to_string(),
                None,
                PaymentDetails::Bank(BankAccountDetails {
                    bank_name: String::new(),
                    account_holder: customer.display_name(),
                    account_number: String::new(),
                    branch_code: String::new(),
                    account_type: BankAccountType::Current,
                }),
            ),
        };

        let mandate_id = Uuid::new_v4();
        let method = PaymentMethod {
            id: Uuid::new_v4(),
            customer_id: customer.id,
            order_id: Some(order.id),
            method_type: request.payment_method_type,
            display_name,
            last_four,
            encrypted_details: self.store.seal(&details)?,
            is_primary: false,
            is_active: true,
            status: PaymentMethodStatus::Pending,
            mandate_id: Some(mandate_id),
            mandate_status: Some(MandateStatus::Pending),
            netcash_account_reference: Some(reference.to_string()),
            mandate_active: false,
            mandate_signed_at: None,
            file_token: None,
            created_at: now,
            updated_at: now,
        };

        let commencement = Commencement::next_month(now.date_naive(), request.debit_day, &self.config.allowed_billing_days);
        let batch = MandateBatchRequest {
            account_reference: reference.to_string(),
            mandate_name: customer.display_name(),
            mandate_amount: request.mandate_amount,
            is_consumer: customer.account_type != AccountType::Business,
            first_name: customer.first_name.clone(),
            surname: customer.last_name.clone(),
            mobile_number: customer.phone.clone().unwrap_or_default(),
            email_address: customer.email.clone(),
            debit_frequency: request.debit_frequency,
            commencement,
            agreement_date: now.date_naive(),
            agreement_reference: order.order_number.clone(),
            send_mandate: true,
            public_holiday_option: 1,
            bank_details: request.bank_details.clone(),
            field1: Some(order.id.to_string()),
            field2: Some(order.order_number.clone()),
            field3: Some(customer.id.to_string()),
        };

        let mandate = MandateRequest {
            id: mandate_id,
            payment_method_id: method.id,
            order_id: order.id,
            customer_id: customer.id,
            status: MandateStatus::Pending,
            netcash_account_reference: reference.to_string(),
            billing_day: commencement.day,
            mandate_amount: request.mandate_amount,
            mandate_frequency: request.debit_frequency,
            request_payload: batch,
            file_token: None,
            response_code: None,
            error_messages: Vec::new(),
            signed_document_url: None,
            notification: NotificationTracking::default(),
            expires_at: now + Duration::days(self.config.signing_window_days),
            created_at: now,
            updated_at: now,
            audit: vec![AuditEntry::at(
                now,
                AuditMetadata::MandateInitiated {
                    order_number: order.order_number.clone(),
                    payment_method_id: method.id,
                    mandate_amount: request.mandate_amount,
                    billing_day: commencement.day,
                    notes: request.notes.clone(),
                },
            )],
        };

        self.repo
            .create_mandate_request(method.clone(), mandate.clone())
            .await
            .map_err(|e| context("create mandate request", e))?;

        match self.gateway.submit_mandate(&mandate.request_payload).await {
            Ok(file_token) => self.mark_sent(mandate, method, file_token).await,
            Err(e) => Err(self.mark_failed(mandate, method, e).await),
        }
    }

    async fn mark_sent(
        &self,
        mut mandate: MandateRequest,
        mut method: PaymentMethod,
        file_token: String,
    ) -> AppResult<InitiateMandateResponse> {
        let now = Utc::now();
        mandate.status = MandateStatus::Sent;
        mandate.file_token = Some(file_token.clone());
        mandate.updated_at = now;
        mandate.audit.push(AuditEntry::at(
            now,
            AuditMetadata::MandateSubmitted {
                file_token: file_token.clone(),
            },
        ));
        method.file_token = Some(file_token.clone());
        method.mandate_status = Some(MandateStatus::Sent);
        method.updated_at = now;

        let response = InitiateMandateResponse {
            mandate_request_id: mandate.id,
            payment_method_id: method.id,
            account_reference: mandate.netcash_account_reference.clone(),
            signing_url: self.signing_url(mandate.order_id),
            file_token,
            status: MandateStatus::Sent,
            expires_at: mandate.expires_at,
        };

        let applied = self
            .repo
            .apply_mandate_transition(MandateTransition {
                mandate,
                expected_status: MandateStatus::Pending,
                method: Some(method),
                promote_method: false,
                order_update: Some(OrderUpdate {
                    only_from: None,
                    to: OrderStatus::PaymentMethodPending,
                }),
            })
            .await
            .map_err(|e| context("record mandate submission", e))?;
        if !applied {
            warn!(
                mandate_request_id = %response.mandate_request_id,
                file_token = %response.file_token,
                "Mandate request was superseded during submission"
            );
            return Err(AppError::Conflict(format!(
                "mandate request {} changed while the gateway call was in flight",
                response.mandate_request_id
            )));
        }

        self.metrics.record_mandate_submitted();
        self.metrics.record_transition(MandateStatus::Sent.as_str());
        info!(
            mandate_request_id = %response.mandate_request_id,
            account_reference = %response.account_reference,
            "Mandate request sent"
        );
        Ok(response)
    }

    /// Mark both records failed and hand back the gateway error
    async fn mark_failed(&self, mut mandate: MandateRequest, mut method: PaymentMethod, err: AppError) -> AppError {
        let (code, message) = match &err {
            AppError::Gateway { code, message } => (code.clone(), message.clone()),
            other => ("INTERNAL".to_string(), other.to_string()),
        };
        warn!(
            mandate_request_id = %mandate.id,
            account_reference = %mandate.netcash_account_reference,
            code = %code,
            error = %message,
            "Mandate submission failed"
        );

        let now = Utc::now();
        mandate.status = MandateStatus::Failed;
        mandate.response_code = Some(code.clone());
        mandate.error_messages.push(message.clone());
        mandate.updated_at = now;
        mandate.audit.push(AuditEntry::at(
            now,
            AuditMetadata::MandateSubmissionFailed {
                code: code.clone(),
                message: message.clone(),
            },
        ));
        method.status = PaymentMethodStatus::Failed;
        method.mandate_status = Some(MandateStatus::Failed);
        method.updated_at = now;

        if let Err(e) = self
            .repo
            .apply_mandate_transition(MandateTransition {
                mandate,
                expected_status: MandateStatus::Pending,
                method: Some(method),
                promote_method: false,
                order_update: None,
            })
            .await
        {
            tracing::error!(error = %e, "Failed to record mandate submission failure");
        }

        self.metrics.record_mandate_failed();
        self.metrics.record_transition(MandateStatus::Failed.as_str());
        AppError::gateway(code, message)
    }

    /// Latest mandate request for an order
    pub async fn status(&self, order_id: Uuid) -> AppResult<MandateStatusView> {
        let mandate = self
            .repo
            .latest_mandate_for_order(order_id)
            .await
            .map_err(|e| context("load mandate request", e))?
            .ok_or_else(|| AppError::NotFound(format!("mandate request for order {}", order_id)))?;
        let method = self
            .repo
            .get_payment_method(mandate.payment_method_id)
            .await
            .map_err(|e| context("load payment method", e))?;

        Ok(MandateStatusView {
            mandate_request_id: mandate.id,
            order_id: mandate.order_id,
            status: mandate.status,
            account_reference: mandate.netcash_account_reference,
            billing_day: mandate.billing_day,
            mandate_amount: mandate.mandate_amount,
            expires_at: mandate.expires_at,
            file_token: mandate.file_token,
            signed_document_url: mandate.signed_document_url,
            error_messages: mandate.error_messages,
            payment_method: method.filter(|m| m.is_active).map(|m| m.to_display()),
        })
    }

    /// Gateway load report for the order's latest submitted batch
    pub async fn load_report(&self, order_id: Uuid) -> AppResult<LoadReport> {
        let mandate = self
            .repo
            .latest_mandate_for_order(order_id)
            .await
            .map_err(|e| context("load mandate request", e))?
            .ok_or_else(|| AppError::NotFound(format!("mandate request for order {}", order_id)))?;
        let file_token = mandate
            .file_token
            .ok_or_else(|| AppError::Validation("Mandate request was never accepted by the gateway".to_string()))?;
        self.gateway.request_load_report(&file_token).await
    }
}
