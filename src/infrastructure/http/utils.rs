//! HTTP utilities - Common helper filters

use std::convert::Infallible;

use warp::Filter;

use crate::domain::auth::Caller;
use crate::infrastructure::adapters::{TokenAuthenticator, SIGNATURE_HEADER};

/// Inject a cloneable value into a route
pub fn with_state<T: Clone + Send>(value: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone {
    warp::any().map(move || value.clone())
}

/// Caller resolved from the `Authorization` header.
///
/// Chain it after the path and method filters so unmatched routes still 404.
pub fn authenticated(
    authenticator: TokenAuthenticator,
) -> impl Filter<Extract = (Caller,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(authenticator))
        .and_then(|header: Option<String>, authenticator: TokenAuthenticator| async move {
            authenticator
                .authenticate(header.as_deref())
                .map_err(warp::reject::custom)
        })
}

/// JSON body capped at `limit` bytes
pub fn json_body<T: serde::de::DeserializeOwned + Send>(
    limit: u64,
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone {
    warp::body::content_length_limit(limit).and(warp::body::json())
}

/// Signature header and raw body of a gateway webhook
pub fn signed_body(
    limit: u64,
) -> impl Filter<Extract = (Option<String>, bytes::Bytes), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(SIGNATURE_HEADER)
        .and(warp::body::content_length_limit(limit))
        .and(warp::body::bytes())
}
