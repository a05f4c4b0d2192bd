//! HTTP route handlers module
//!
//! Handlers are thin: they call one service operation and hand the result
//! to the response formatter.

pub mod collections;
pub mod health;
pub mod mandates;
pub mod metrics;
pub mod payment_methods;
pub mod webhooks;

pub use collections::{handle_failed_collection, handle_uncollectable_sweep};
pub use health::handle_health_request;
pub use mandates::{handle_initiate_mandate, handle_load_report, handle_mandate_status, handle_mandate_sweep};
pub use metrics::handle_metrics_request;
pub use payment_methods::{
    handle_add_payment_method, handle_get_primary, handle_list_payment_methods, handle_remove_payment_method,
    handle_set_primary,
};
pub use webhooks::{handle_mandate_postback, handle_pay_now_notice};
