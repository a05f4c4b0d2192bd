//! Route builder module
//!
//! This module contains the main route builder that orchestrates the creation
//! of all application routes.

use warp::Filter;

use crate::config::AppConfig;
use crate::infrastructure::bootstrap::ServiceContainer;
use crate::infrastructure::http::responses::handle_rejection;
use crate::infrastructure::http::routes::{
    CollectionRoutes, HealthRoutes, MandateRoutes, MetricsRoutes, PaymentMethodRoutes, WebhookRoutes,
};

/// Route builder that orchestrates the creation of all application routes
pub struct RouteBuilder;

impl RouteBuilder {
    /// Build all application routes
    pub fn build_routes(
        config: &AppConfig,
        services: ServiceContainer,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        let body_limit = config.server.max_request_size as u64;

        let auth = services.authenticator;

        let payment_methods = PaymentMethodRoutes::create_routes(services.store, auth.clone(), body_limit);
        let mandates =
            MandateRoutes::create_routes(services.orchestrator, services.reconciler, auth.clone(), body_limit);
        let webhooks = WebhookRoutes::create_routes(services.ingress, services.webhook_limiter, body_limit);
        let collections = CollectionRoutes::create_routes(services.fallback, auth, body_limit);
        let health = HealthRoutes::create_health_route(services.health);
        let metrics = MetricsRoutes::create_prometheus_route(services.metrics);

        payment_methods
            .or(mandates)
            .or(webhooks)
            .or(collections)
            .or(health)
            .or(metrics)
            .recover(handle_rejection)
    }
}
