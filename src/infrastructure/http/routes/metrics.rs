//! Metrics routes module

use warp::Filter;

use crate::infrastructure::http::handlers::handle_metrics_request;
use crate::infrastructure::http::utils::with_state;
use crate::shared::metrics::MetricsUtils;

/// Metrics routes configuration
pub struct MetricsRoutes;

impl MetricsRoutes {
    /// Create the Prometheus metrics endpoint route
    pub fn create_prometheus_route(
        metrics: MetricsUtils,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        warp::path!("metrics")
            .and(warp::get())
            .and(with_state(metrics))
            .and_then(handle_metrics_request)
    }
}
