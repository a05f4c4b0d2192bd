//! Metrics utilities module
//!
//! Prometheus counters for mandate, webhook and Pay Now activity.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Metrics utilities for the application
#[derive(Clone)]
pub struct MetricsUtils {
    registry: Registry,
    mandates_submitted: IntCounter,
    mandates_failed: IntCounter,
    mandate_transitions: IntCounterVec,
    webhooks: IntCounterVec,
    paynow_links_issued: IntCounter,
    notification_failures: IntCounterVec,
}

impl MetricsUtils {
    /// Create a new metrics instance with its own registry
    pub fn new() -> Self {
        let registry = Registry::new();

        let mandates_submitted = IntCounter::new(
            "mandate_requests_submitted_total",
            "Mandate requests accepted by the gateway",
        )
        .expect("static metric definition");
        let mandates_failed = IntCounter::new(
            "mandate_requests_failed_total",
            "Mandate requests rejected by the gateway or timed out",
        )
        .expect("static metric definition");
        let mandate_transitions = IntCounterVec::new(
            Opts::new("mandate_transitions_total", "Mandate status transitions"),
            &["status"],
        )
        .expect("static metric definition");
        let webhooks = IntCounterVec::new(
            Opts::new("webhooks_total", "Inbound gateway webhooks by kind and outcome"),
            &["kind", "outcome"],
        )
        .expect("static metric definition");
        let paynow_links_issued = IntCounter::new(
            "paynow_links_issued_total",
            "Pay Now links generated for failed collections",
        )
        .expect("static metric definition");
        let notification_failures = IntCounterVec::new(
            Opts::new("notification_failures_total", "Failed notification deliveries"),
            &["channel"],
        )
        .expect("static metric definition");

        for collector in [
            Box::new(mandates_submitted.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(mandates_failed.clone()),
            Box::new(mandate_transitions.clone()),
            Box::new(webhooks.clone()),
            Box::new(paynow_links_issued.clone()),
            Box::new(notification_failures.clone()),
        ] {
            // Names are unique within this fresh registry.
            let _ = registry.register(collector);
        }

        Self {
            registry,
            mandates_submitted,
            mandates_failed,
            mandate_transitions,
            webhooks,
            paynow_links_issued,
            notification_failures,
        }
    }

    pub fn record_mandate_submitted(&self) {
        self.mandates_submitted.inc();
    }

    pub fn record_mandate_failed(&self) {
        self.mandates_failed.inc();
    }

    /// Record a mandate reaching a new status
    pub fn record_transition(&self, status: &str) {
        self.mandate_transitions.with_label_values(&[status]).inc();
    }

    /// Record a webhook delivery and what happened to it
    pub fn record_webhook(&self, kind: &str, outcome: &str) {
        self.webhooks.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_paynow_issued(&self) {
        self.paynow_links_issued.inc();
    }

    pub fn record_notification_failure(&self, channel: &str) {
        self.notification_failures.with_label_values(&[channel]).inc();
    }

    /// Current value of a webhook counter
    pub fn webhook_count(&self, kind: &str, outcome: &str) -> u64 {
        self.webhooks.with_label_values(&[kind, outcome]).get()
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsUtils {
    fn default() -> Self {
        Self::new()
    }
}
