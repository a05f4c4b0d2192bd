//! Health routes module

use std::sync::Arc;

use warp::Filter;

use crate::application::use_cases::HealthCheckUseCase;
use crate::infrastructure::http::handlers::handle_health_request;
use crate::infrastructure::http::utils::with_state;

/// Health routes configuration
pub struct HealthRoutes;

impl HealthRoutes {
    /// Create the health check endpoint route
    pub fn create_health_route(
        health_use_case: Arc<HealthCheckUseCase>,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("health")
            .and(warp::get())
            .and(with_state(health_use_case))
            .and_then(handle_health_request)
    }
}
