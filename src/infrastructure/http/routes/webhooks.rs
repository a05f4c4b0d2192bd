//! Gateway webhook routes

use std::sync::Arc;

use warp::Filter;

use crate::application::services::WebhookIngress;
use crate::infrastructure::http::handlers::{handle_mandate_postback, handle_pay_now_notice};
use crate::infrastructure::http::rate_limit::{rate_limited, WebhookRateLimiter};
use crate::infrastructure::http::utils::{signed_body, with_state};

pub struct WebhookRoutes;

impl WebhookRoutes {
    pub fn create_routes(
        ingress: Arc<WebhookIngress>,
        limiter: WebhookRateLimiter,
        body_limit: u64,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let mandate = warp::path!("webhooks" / "netcash" / "mandate")
            .and(warp::post())
            .and(rate_limited(limiter.clone()))
            .and(signed_body(body_limit))
            .and(with_state(ingress.clone()))
            .and_then(handle_mandate_postback);

        let pay_now = warp::path!("webhooks" / "netcash" / "paynow")
            .and(warp::post())
            .and(rate_limited(limiter))
            .and(signed_body(body_limit))
            .and(with_state(ingress))
            .and_then(handle_pay_now_notice);

        mandate.or(pay_now)
    }
}
