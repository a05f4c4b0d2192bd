//! HTTP routes module
//!
//! This module contains all HTTP route configurations.

pub mod builder;
pub mod collections;
pub mod health;
pub mod mandates;
pub mod metrics;
pub mod payment_methods;
pub mod webhooks;

pub use builder::RouteBuilder;
pub use collections::CollectionRoutes;
pub use health::HealthRoutes;
pub use mandates::MandateRoutes;
pub use metrics::MetricsRoutes;
pub use payment_methods::PaymentMethodRoutes;
pub use webhooks::WebhookRoutes;
