//! Mandate status reconciliation
//!
//! Applies gateway postbacks and the expiry sweep to mandate requests.
//! Every change is a compare-and-set on the stored status, so redelivered
//! or late postbacks for a request that already moved on are no-ops.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::services::payment_method_service::{context, PaymentMethodStore};
use crate::domain::audit::{AuditEntry, AuditMetadata};
use crate::domain::billing::OrderStatus;
use crate::domain::mandate::{MandatePostback, MandateRequest, MandateStatus, PostbackOutcome};
use crate::domain::payment_method::{mask_details, PaymentDetails, PaymentMethodStatus, PaymentMethodType};
use crate::infrastructure::adapters::{BillingRepository, MandateTransition, OrderUpdate};
use crate::shared::error::AppResult;
use crate::shared::metrics::MetricsUtils;

/// What a postback did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(MandateStatus),
    /// The request is no longer waiting for a postback
    Ignored { current: MandateStatus },
    UnknownReference,
}

pub struct MandateReconciler {
    repo: Arc<dyn BillingRepository>,
    store: Arc<PaymentMethodStore>,
    metrics: MetricsUtils,
}

impl MandateReconciler {
    pub fn new(repo: Arc<dyn BillingRepository>, store: Arc<PaymentMethodStore>, metrics: MetricsUtils) -> Self {
        Self { repo, store, metrics }
    }

    /// Request a postback refers to: the order passthrough first, then the account reference
    pub async fn locate(&self, postback: &MandatePostback) -> AppResult<Option<MandateRequest>> {
        if let Some(order_id) = postback.field1.as_deref().and_then(|v| Uuid::parse_str(v.trim()).ok()) {
            let by_order = self
                .repo
                .latest_mandate_for_order(order_id)
                .await
                .map_err(|e| context("load mandate request", e))?;
            if let Some(mandate) = by_order.filter(|m| m.netcash_account_reference == postback.account_ref) {
                return Ok(Some(mandate));
            }
        }
        self.repo
            .latest_mandate_for_reference(&postback.account_ref)
            .await
            .map_err(|e| context("load mandate request", e))
    }

    pub async fn apply_postback(&self, postback: &MandatePostback) -> AppResult<ReconcileOutcome> {
        let Some(mut mandate) = self.locate(postback).await? else {
            warn!(account_reference = %postback.account_ref, "Postback for unknown account reference");
            return Ok(ReconcileOutcome::UnknownReference);
        };

        if mandate.status != MandateStatus::Sent {
            info!(
                mandate_request_id = %mandate.id,
                status = mandate.status.as_str(),
                "Postback ignored, mandate request is not awaiting a signature"
            );
            return Ok(ReconcileOutcome::Ignored { current: mandate.status });
        }

        let mut method = self
            .repo
            .get_payment_method(mandate.payment_method_id)
            .await
            .map_err(|e| context("load payment method", e))?;

        let now = Utc::now();
        let expected = mandate.status;
        let outcome = postback.outcome();
        let (next, promote_method, order_update) = match outcome {
            PostbackOutcome::Signed => {
                let bank = postback.bank_details();
                if let Some(method) = method.as_mut() {
                    if let Some(bank) = &bank {
                        let details = PaymentDetails::Bank(bank.clone());
                        let label = mask_details(PaymentMethodType::DebitOrder, &details)?;
                        method.display_name = label.display_name;
                        method.last_four = label.last_four;
                        method.encrypted_details = self.store.seal(&details)?;
                    }
                    method.status = PaymentMethodStatus::Active;
                    method.mandate_status = Some(MandateStatus::Signed);
                    method.mandate_active = true;
                    method.mandate_signed_at = Some(now);
                    method.updated_at = now;
                }
                mandate.signed_document_url = postback.mandate_pdf_link.clone();
                mandate.audit.push(AuditEntry::at(
                    now,
                    AuditMetadata::MandateSigned {
                        bank_name: bank.as_ref().map(|b| b.bank_name.clone()),
                        last_four: method.as_ref().and_then(|m| m.last_four.clone()),
                        signed_document_url: postback.mandate_pdf_link.clone(),
                    },
                ));
                (
                    MandateStatus::Signed,
                    true,
                    Some(OrderUpdate {
                        only_from: Some(OrderStatus::PaymentMethodPending),
                        to: OrderStatus::PaymentMethodRegistered,
                    }),
                )
            }
            PostbackOutcome::Declined => {
                if let Some(method) = method.as_mut() {
                    method.status = PaymentMethodStatus::Failed;
                    method.mandate_status = Some(MandateStatus::Declined);
                    method.updated_at = now;
                }
                if let Some(reason) = postback.reason_for_decline.clone().filter(|r| !r.trim().is_empty()) {
                    mandate.error_messages.push(reason);
                }
                mandate.audit.push(AuditEntry::at(
                    now,
                    AuditMetadata::MandateDeclined {
                        reason: postback.reason_for_decline.clone(),
                    },
                ));
                (MandateStatus::Declined, false, None)
            }
        };

        mandate.status = next;
        mandate.updated_at = now;
        let mandate_id = mandate.id;
        let applied = self
            .repo
            .apply_mandate_transition(MandateTransition {
                mandate,
                expected_status: expected,
                method,
                promote_method,
                order_update,
            })
            .await
            .map_err(|e| context("apply mandate postback", e))?;

        if !applied {
            let current = self
                .repo
                .get_mandate_request(mandate_id)
                .await
                .map_err(|e| context("load mandate request", e))?
                .map(|m| m.status)
                .unwrap_or(next);
            info!(mandate_request_id = %mandate_id, "Postback lost a race with another update");
            return Ok(ReconcileOutcome::Ignored { current });
        }

        self.metrics.record_transition(next.as_str());
        info!(
            mandate_request_id = %mandate_id,
            account_reference = %postback.account_ref,
            status = next.as_str(),
            "Mandate postback applied"
        );
        Ok(ReconcileOutcome::Applied(next))
    }

    /// Expire every unsigned request past its deadline; returns how many moved
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> AppResult<usize> {
        let overdue = self
            .repo
            .find_expirable_mandates(now)
            .await
            .map_err(|e| context("find expirable mandates", e))?;

        let mut expired = 0;
        for mut mandate in overdue {
            let expected = mandate.status;
            if !expected.can_transition_to(MandateStatus::Expired) {
                continue;
            }

            let method = self
                .repo
                .get_payment_method(mandate.payment_method_id)
                .await
                .map_err(|e| context("load payment method", e))?
                .map(|mut m| {
                    m.status = PaymentMethodStatus::Expired;
                    m.mandate_status = Some(MandateStatus::Expired);
                    m.updated_at = now;
                    m
                });

            mandate.audit.push(AuditEntry::at(
                now,
                AuditMetadata::MandateExpired {
                    expired_after: mandate.expires_at,
                },
            ));
            mandate.status = MandateStatus::Expired;
            mandate.updated_at = now;
            let mandate_id = mandate.id;

            let applied = self
                .repo
                .apply_mandate_transition(MandateTransition {
                    mandate,
                    expected_status: expected,
                    method,
                    promote_method: false,
                    order_update: None,
                })
                .await
                .map_err(|e| context("expire mandate request", e))?;
            if applied {
                expired += 1;
                self.metrics.record_transition(MandateStatus::Expired.as_str());
                info!(mandate_request_id = %mandate_id, "Mandate request expired");
            }
        }
        Ok(expired)
    }
}
