//! Application services - Orchestration of domain logic

pub mod fallback_service;
pub mod mandate_service;
pub mod payment_method_service;
pub mod reconciliation_service;
pub mod webhook_service;

pub use fallback_service::{
    FailedCollectionReport, FallbackEngine, FallbackOutcome, SettlementResult, SweepFailure, UncollectableSweepRequest,
    UncollectableSweepSummary,
};
pub use mandate_service::{InitiateMandateRequest, InitiateMandateResponse, MandateOrchestrator, MandateStatusView};
pub use payment_method_service::{AddPaymentMethodRequest, PaymentMethodStore};
pub use reconciliation_service::{MandateReconciler, ReconcileOutcome};
pub use webhook_service::{WebhookAck, WebhookIngress};
