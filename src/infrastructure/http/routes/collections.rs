use std::sync::Arc;

use warp::Filter;

use crate::application::services::FallbackEngine;
use crate::infrastructure::adapters::TokenAuthenticator;
use crate::infrastructure::http::handlers::{handle_failed_collection, handle_uncollectable_sweep};
use crate::infrastructure::http::utils::{authenticated, json_body, with_state};

/// Failed-collection intake and the uncollectable invoice sweep
pub struct CollectionRoutes;

impl CollectionRoutes {
    pub fn create_routes(
        fallback: Arc<FallbackEngine>,
        authenticator: TokenAuthenticator,
        body_limit: u64,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let failed = warp::path!("collections" / "failed")
            .and(warp::post())
            .and(authenticated(authenticator.clone()))
            .and(json_body(body_limit))
            .and(with_state(fallback.clone()))
            .and_then(handle_failed_collection);

        let uncollectable = warp::path!("collections" / "uncollectable")
            .and(warp::post())
            .and(authenticated(authenticator))
            .and(json_body(body_limit))
            .and(with_state(fallback))
            .and_then(handle_uncollectable_sweep);

        failed.or(uncollectable)
    }
}
