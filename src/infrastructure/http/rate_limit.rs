//! Per-client rate limiting for the public webhook endpoints

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use warp::Filter;

use crate::config::app_config::RateLimitConfig;
use crate::infrastructure::http::utils::with_state;
use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// Tracked clients before idle entries are pruned
const PRUNE_THRESHOLD: usize = 10_000;

/// Keyed on the originating client address. Disabled limiters let everything through.
#[derive(Clone)]
pub struct WebhookRateLimiter {
    limiter: Option<Arc<DefaultKeyedRateLimiter<String>>>,
}

impl WebhookRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { limiter: None };
        }
        let per_minute = NonZeroU32::new(config.webhook_requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Some(Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute).allow_burst(burst)))),
        }
    }

    pub fn check(&self, client: &str) -> AppResult<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };
        if limiter.len() > PRUNE_THRESHOLD {
            limiter.retain_recent();
        }
        limiter.check_key(&client.to_string()).map_err(|_| {
            LoggingUtils::log_security_event("rate_limited", "webhook quota exhausted", client);
            AppError::RateLimited
        })
    }
}

/// First hop of `X-Forwarded-For`, as set by the load balancer
pub fn client_key(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|header| header.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Rejects with `RateLimited` once the client's quota is spent
pub fn rate_limited(
    limiter: WebhookRateLimiter,
) -> impl Filter<Extract = (), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(FORWARDED_FOR_HEADER)
        .and(with_state(limiter))
        .and_then(|forwarded_for: Option<String>, limiter: WebhookRateLimiter| async move {
            limiter
                .check(&client_key(forwarded_for.as_deref()))
                .map_err(warp::reject::custom)
        })
        .untuple_one()
}
