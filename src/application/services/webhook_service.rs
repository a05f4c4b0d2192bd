//! Inbound gateway webhooks
//!
//! Authenticates the raw body, drops redeliveries through the processed
//! event store, then hands the payload to the reconciler or the fallback
//! engine. A claim is released again if applying the event fails so the
//! gateway's retry gets a fresh attempt.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::services::fallback_service::{FallbackEngine, SettlementResult};
use crate::application::services::reconciliation_service::{MandateReconciler, ReconcileOutcome};
use crate::domain::billing::PayNowNotice;
use crate::domain::mandate::MandatePostback;
use crate::infrastructure::adapters::{ProcessedEventStore, WebhookVerifier};
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;
use crate::shared::metrics::MetricsUtils;

const MANDATE_KIND: &str = "mandate";
const PAYNOW_KIND: &str = "paynow";

/// Acknowledgement returned to the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookAck {
    pub kind: String,
    pub outcome: String,
    pub duplicate: bool,
}

impl WebhookAck {
    fn new(kind: &str, outcome: &str) -> Self {
        Self {
            kind: kind.to_string(),
            outcome: outcome.to_string(),
            duplicate: false,
        }
    }

    fn duplicate(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            outcome: "duplicate".to_string(),
            duplicate: true,
        }
    }
}

pub struct WebhookIngress {
    verifier: WebhookVerifier,
    events: ProcessedEventStore,
    reconciler: Arc<MandateReconciler>,
    fallback: Arc<FallbackEngine>,
    metrics: MetricsUtils,
}

impl WebhookIngress {
    pub fn new(
        verifier: WebhookVerifier,
        events: ProcessedEventStore,
        reconciler: Arc<MandateReconciler>,
        fallback: Arc<FallbackEngine>,
        metrics: MetricsUtils,
    ) -> Self {
        Self {
            verifier,
            events,
            reconciler,
            fallback,
            metrics,
        }
    }

    fn authenticate(&self, kind: &str, body: &[u8], signature: Option<&str>) -> AppResult<()> {
        self.verifier.verify(body, signature).inspect_err(|e| {
            self.metrics.record_webhook(kind, "rejected");
            LoggingUtils::log_security_event("webhook_signature_invalid", &e.to_string(), kind);
        })
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, kind: &str, body: &[u8]) -> AppResult<T> {
        serde_json::from_slice(body).map_err(|e| {
            self.metrics.record_webhook(kind, "invalid");
            AppError::Validation(format!("Malformed {} webhook: {}", kind, e))
        })
    }

    /// Mandate signed/declined postback
    pub async fn handle_mandate(&self, body: &[u8], signature: Option<&str>) -> AppResult<WebhookAck> {
        self.authenticate(MANDATE_KIND, body, signature)?;
        let postback: MandatePostback = self.parse(MANDATE_KIND, body)?;

        let Some(mandate) = self.reconciler.locate(&postback).await? else {
            warn!(account_reference = %postback.account_ref, "Mandate postback for unknown account reference");
            self.metrics.record_webhook(MANDATE_KIND, "unknown");
            return Ok(WebhookAck::new(MANDATE_KIND, "unknown_reference"));
        };

        // A new request for the same reference gets its own key.
        let event = ProcessedEventStore::event_key(
            MANDATE_KIND,
            &format!("{}/{}", postback.account_ref, mandate.id),
            postback.outcome().as_str(),
        );
        if !self.events.mark_processed(&event).await? {
            debug!(event = %event, "Duplicate mandate postback dropped");
            self.metrics.record_webhook(MANDATE_KIND, "duplicate");
            return Ok(WebhookAck::duplicate(MANDATE_KIND));
        }

        let outcome = match self.reconciler.apply_postback(&postback).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.release(&event).await;
                return Err(e);
            }
        };

        let label = match outcome {
            ReconcileOutcome::Applied(status) => status.as_str(),
            ReconcileOutcome::Ignored { .. } => "ignored",
            ReconcileOutcome::UnknownReference => "unknown_reference",
        };
        self.metrics.record_webhook(MANDATE_KIND, label);
        Ok(WebhookAck::new(MANDATE_KIND, label))
    }

    /// Pay Now settlement notice
    pub async fn handle_pay_now(&self, body: &[u8], signature: Option<&str>) -> AppResult<WebhookAck> {
        self.authenticate(PAYNOW_KIND, body, signature)?;
        let notice: PayNowNotice = self.parse(PAYNOW_KIND, body)?;

        let status = if notice.is_accepted() { "accepted" } else { "not_accepted" };
        let event = ProcessedEventStore::event_key(PAYNOW_KIND, &notice.reference, status);
        if !self.events.mark_processed(&event).await? {
            debug!(event = %event, "Duplicate Pay Now notice dropped");
            self.metrics.record_webhook(PAYNOW_KIND, "duplicate");
            return Ok(WebhookAck::duplicate(PAYNOW_KIND));
        }

        let result = match self.fallback.settle_pay_now(&notice).await {
            Ok(result) => result,
            Err(e) => {
                self.release(&event).await;
                return Err(e);
            }
        };

        let label = match result {
            SettlementResult::Settled { .. } => "settled",
            SettlementResult::NotAccepted => "not_accepted",
            SettlementResult::AlreadyPaid => "already_paid",
            SettlementResult::UnknownReference => "unknown_reference",
            SettlementResult::Underpaid { .. } => "underpaid",
        };
        self.metrics.record_webhook(PAYNOW_KIND, label);
        Ok(WebhookAck::new(PAYNOW_KIND, label))
    }

    async fn release(&self, event: &str) {
        if let Err(e) = self.events.forget(event).await {
            warn!(event = %event, error = %e, "Failed to release webhook claim");
        }
    }
}
