//! Failed-collection fallback
//!
//! When a scheduled debit fails the invoice gets a one-time Pay Now link
//! and the customer hears about it on email and SMS. The later Pay Now
//! settlement notice closes the invoice.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::application::services::payment_method_service::{context, PaymentMethodStore};
use crate::domain::billing::{
    CollectionFailure, Customer, Invoice, InvoiceStatus, PayNowLink, PayNowNotice, PayNowRequest, SettlementOutcome,
};
use crate::domain::notification::{Channel, DeliveryResult, EmailMessage, SmsMessage, SmsTemplate};
use crate::infrastructure::adapters::{AccountLock, BillingRepository, MandateGateway, Notifier};
use crate::shared::error::{AppError, AppResult};
use crate::shared::metrics::MetricsUtils;
use crate::shared::validation::ValidationUtils;

/// A failed scheduled collection, as reported by the batch result or gateway
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FailedCollectionReport {
    pub invoice_id: Uuid,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
    /// The customer's debit order was never activated
    #[serde(default)]
    pub mandate_inactive: bool,
    /// Issue a new link even if the invoice already has one
    #[serde(default)]
    pub force_regenerate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackOutcome {
    pub invoice_id: Uuid,
    pub paynow_url: String,
    pub transaction_reference: String,
    pub amount: Decimal,
    pub link_reused: bool,
    pub email: DeliveryResult,
    pub sms: DeliveryResult,
}

impl FallbackOutcome {
    /// Channels that accepted the message
    pub fn delivered_channels(&self) -> Vec<Channel> {
        let mut channels = Vec::new();
        if self.email.success {
            channels.push(Channel::Email);
        }
        if self.sms.success {
            channels.push(Channel::Sms);
        }
        channels
    }
}

/// Reason recorded on invoices swept for lack of a collectable method
pub const NO_COLLECTABLE_METHOD_REASON: &str = "No collectable payment method on file";

/// Which outstanding invoices to check; empty means all of them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UncollectableSweepRequest {
    #[serde(default)]
    pub invoice_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFailure {
    pub invoice_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UncollectableSweepSummary {
    pub examined: usize,
    /// Customer has a primary method the debit run can use
    pub collectable: usize,
    /// A Pay Now link was already sent for the invoice
    pub already_notified: usize,
    pub issued: Vec<FallbackOutcome>,
    pub failed: Vec<SweepFailure>,
}

/// What a Pay Now notice did
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementResult {
    Settled { invoice_id: Uuid },
    NotAccepted,
    AlreadyPaid,
    UnknownReference,
    Underpaid { expected: Decimal, received: Decimal },
}

pub struct FallbackEngine {
    repo: Arc<dyn BillingRepository>,
    store: Arc<PaymentMethodStore>,
    gateway: Arc<dyn MandateGateway>,
    notifier: Arc<dyn Notifier>,
    lock: AccountLock,
    metrics: MetricsUtils,
}

impl FallbackEngine {
    pub fn new(
        repo: Arc<dyn BillingRepository>,
        store: Arc<PaymentMethodStore>,
        gateway: Arc<dyn MandateGateway>,
        notifier: Arc<dyn Notifier>,
        lock: AccountLock,
        metrics: MetricsUtils,
    ) -> Self {
        Self {
            repo,
            store,
            gateway,
            notifier,
            lock,
            metrics,
        }
    }

    pub async fn handle_failed_collection(&self, report: FailedCollectionReport) -> AppResult<FallbackOutcome> {
        report
            .validate()
            .map_err(|e| AppError::Validation(format!("Invalid collection report: {}", e)))?;

        let invoice = self
            .repo
            .get_invoice(report.invoice_id)
            .await
            .map_err(|e| context("load invoice", e))?
            .ok_or_else(|| AppError::NotFound(format!("invoice {}", report.invoice_id)))?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::Validation(format!(
                "Invoice {} is already paid",
                invoice.invoice_number
            )));
        }
        let customer = self
            .repo
            .get_customer(invoice.customer_id)
            .await
            .map_err(|e| context("load customer", e))?
            .ok_or_else(|| AppError::NotFound(format!("customer {}", invoice.customer_id)))?;

        let lock_key = customer
            .account_number
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| customer.id.to_string());
        let guard = self.lock.acquire(&lock_key).await?;
        let issued = self.issue_link(&report, &invoice, &customer).await;
        if let Err(e) = self.lock.release(guard).await {
            warn!(lock_key = %lock_key, error = %e, "Failed to release account lock");
        }
        let (link, link_reused) = issued?;

        let template = if report.mandate_inactive {
            SmsTemplate::EmandatePending
        } else {
            SmsTemplate::DebitFailed
        };
        let (email, sms) = futures::join!(
            self.send_email(&customer, &invoice, template, &link.url),
            self.send_sms(&customer, &invoice, template, &link.url)
        );

        let outcome = FallbackOutcome {
            invoice_id: invoice.id,
            paynow_url: link.url,
            transaction_reference: link.transaction_reference,
            amount: invoice.amount,
            link_reused,
            email,
            sms,
        };

        for (channel, result) in [(Channel::Email, &outcome.email), (Channel::Sms, &outcome.sms)] {
            if !result.success {
                self.metrics.record_notification_failure(channel.as_str());
                warn!(
                    invoice_id = %invoice.id,
                    channel = channel.as_str(),
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Pay Now notification failed"
                );
            }
        }

        // Link and failure are already stored; delivery bookkeeping is best effort.
        if let Err(e) = self
            .repo
            .record_paynow_delivery(invoice.id, outcome.delivered_channels(), Utc::now())
            .await
        {
            warn!(invoice_id = %invoice.id, error = %e, "Failed to record Pay Now delivery");
        }

        info!(
            invoice_id = %invoice.id,
            transaction_reference = %outcome.transaction_reference,
            link_reused,
            email_sent = outcome.email.success,
            sms_sent = outcome.sms.success,
            "Failed collection handled"
        );
        Ok(outcome)
    }

    /// Send Pay Now links for outstanding invoices whose customer has no
    /// primary method the debit run could collect from.
    ///
    /// Invoices that already carry a delivered link are left alone, so the
    /// sweep can run on every billing cycle.
    pub async fn sweep_uncollectable(&self, request: UncollectableSweepRequest) -> AppResult<UncollectableSweepSummary> {
        let mut invoices = self
            .repo
            .list_outstanding_invoices()
            .await
            .map_err(|e| context("list outstanding invoices", e))?;
        if !request.invoice_ids.is_empty() {
            invoices.retain(|i| request.invoice_ids.contains(&i.id));
        }

        let mut summary = UncollectableSweepSummary {
            examined: invoices.len(),
            ..UncollectableSweepSummary::default()
        };
        for invoice in invoices {
            if invoice.paynow_sent_at.is_some() {
                summary.already_notified += 1;
                continue;
            }
            match self.store.resolve_collection_method(invoice.customer_id).await {
                Ok(_) => {
                    summary.collectable += 1;
                    continue;
                }
                Err(AppError::NotFound(_) | AppError::Validation(_) | AppError::Decryption) => {}
                Err(e) => {
                    warn!(invoice_id = %invoice.id, error = %e, "Could not check collection method");
                    summary.failed.push(SweepFailure {
                        invoice_id: invoice.id,
                        error: e.public_message(),
                    });
                    continue;
                }
            }

            let report = FailedCollectionReport {
                invoice_id: invoice.id,
                reason: NO_COLLECTABLE_METHOD_REASON.to_string(),
                mandate_inactive: true,
                force_regenerate: false,
            };
            match self.handle_failed_collection(report).await {
                Ok(outcome) => summary.issued.push(outcome),
                Err(e) => {
                    warn!(invoice_id = %invoice.id, error = %e, "Pay Now fallback failed during sweep");
                    summary.failed.push(SweepFailure {
                        invoice_id: invoice.id,
                        error: e.public_message(),
                    });
                }
            }
        }

        info!(
            examined = summary.examined,
            issued = summary.issued.len(),
            collectable = summary.collectable,
            already_notified = summary.already_notified,
            failed = summary.failed.len(),
            "Uncollectable invoice sweep finished"
        );
        Ok(summary)
    }

    /// Record the failure and produce the link, reusing a stored one unless told not to
    async fn issue_link(
        &self,
        report: &FailedCollectionReport,
        invoice: &Invoice,
        customer: &Customer,
    ) -> AppResult<(PayNowLink, bool)> {
        let now = Utc::now();
        let invoice = self
            .repo
            .record_collection_failure(
                invoice.id,
                CollectionFailure {
                    reason: report.reason.clone(),
                    recorded_at: now,
                },
            )
            .await
            .map_err(|e| context("record collection failure", e))?;

        if !report.force_regenerate {
            if let (Some(url), Some(reference)) = (&invoice.paynow_url, &invoice.paynow_transaction_ref) {
                return Ok((
                    PayNowLink {
                        url: url.clone(),
                        transaction_reference: reference.clone(),
                    },
                    true,
                ));
            }
        }

        let request = PayNowRequest {
            transaction_reference: PayNowRequest::transaction_reference_for(&invoice.invoice_number, now),
            amount: invoice.amount,
            description: format!("Invoice {}", invoice.invoice_number),
            invoice_id: invoice.id,
            customer_email: customer.email.clone(),
            customer_phone: customer.phone.as_deref().map(ValidationUtils::normalize_mobile_number),
        };
        let link = self.gateway.create_pay_now(&request).await?;
        self.repo
            .record_paynow_link(invoice.id, &link, invoice.amount)
            .await
            .map_err(|e| context("record Pay Now link", e))?;
        self.metrics.record_paynow_issued();
        Ok((link, false))
    }

    async fn send_email(&self, customer: &Customer, invoice: &Invoice, template: SmsTemplate, url: &str) -> DeliveryResult {
        let Some(to) = customer.email.clone().filter(|e| !e.trim().is_empty()) else {
            return DeliveryResult::failed("no email address on file");
        };
        let message = EmailMessage {
            to,
            template: template.email_template().to_string(),
            subject: format!("Payment required for invoice {}", invoice.invoice_number),
            data: json!({
                "customer_name": customer.display_name(),
                "invoice_number": invoice.invoice_number,
                "amount": format!("{:.2}", invoice.amount.round_dp(2)),
                "paynow_url": url,
            }),
        };
        self.notifier.send_email(&message).await
    }

    async fn send_sms(&self, customer: &Customer, invoice: &Invoice, template: SmsTemplate, url: &str) -> DeliveryResult {
        let Some(phone) = customer.phone.as_deref().filter(|p| !p.trim().is_empty()) else {
            return DeliveryResult::failed("no mobile number on file");
        };
        let message = SmsMessage {
            to: ValidationUtils::normalize_mobile_number(phone),
            text: template.render(&customer.first_name, &invoice.invoice_number, invoice.amount, url),
        };
        self.notifier.send_sms(&message).await
    }

    /// Apply a Pay Now settlement notice
    pub async fn settle_pay_now(&self, notice: &PayNowNotice) -> AppResult<SettlementResult> {
        if !notice.is_accepted() {
            info!(
                reference = %notice.reference,
                reason = notice.reason.as_deref().unwrap_or(""),
                "Pay Now transaction not accepted"
            );
            return Ok(SettlementResult::NotAccepted);
        }

        let amount = notice.amount_rands()?;
        let outcome = self
            .repo
            .settle_invoice_by_reference(&notice.reference, amount, Utc::now())
            .await
            .map_err(|e| context("settle invoice", e))?;

        Ok(match outcome {
            SettlementOutcome::Settled(invoice) => {
                info!(
                    invoice_id = %invoice.id,
                    reference = %notice.reference,
                    amount = %amount,
                    "Invoice settled by Pay Now"
                );
                SettlementResult::Settled { invoice_id: invoice.id }
            }
            SettlementOutcome::AlreadyPaid => {
                info!(reference = %notice.reference, "Pay Now notice for an invoice already paid");
                SettlementResult::AlreadyPaid
            }
            SettlementOutcome::UnknownReference => {
                warn!(reference = %notice.reference, "Pay Now notice for unknown transaction reference");
                SettlementResult::UnknownReference
            }
            SettlementOutcome::AmountMismatch { expected, received } => {
                warn!(
                    reference = %notice.reference,
                    expected = %expected,
                    received = %received,
                    "Pay Now settlement below invoice amount"
                );
                SettlementResult::Underpaid { expected, received }
            }
        })
    }
}
