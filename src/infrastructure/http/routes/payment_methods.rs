//! Payment method routes

use std::sync::Arc;

use uuid::Uuid;
use warp::Filter;

use crate::application::services::PaymentMethodStore;
use crate::infrastructure::adapters::TokenAuthenticator;
use crate::infrastructure::http::handlers::{
    handle_add_payment_method, handle_get_primary, handle_list_payment_methods, handle_remove_payment_method,
    handle_set_primary,
};
use crate::infrastructure::http::utils::{authenticated, json_body, with_state};

pub struct PaymentMethodRoutes;

impl PaymentMethodRoutes {
    pub fn create_routes(
        store: Arc<PaymentMethodStore>,
        authenticator: TokenAuthenticator,
        body_limit: u64,
    ) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let add = warp::path!("payment-methods" / Uuid)
            .and(warp::post())
            .and(authenticated(authenticator.clone()))
            .and(json_body(body_limit))
            .and(with_state(store.clone()))
            .and_then(handle_add_payment_method);

        let list = warp::path!("payment-methods" / Uuid)
            .and(warp::get())
            .and(authenticated(authenticator.clone()))
            .and(with_state(store.clone()))
            .and_then(handle_list_payment_methods);

        let primary = warp::path!("payment-methods" / Uuid / "primary")
            .and(warp::get())
            .and(authenticated(authenticator.clone()))
            .and(with_state(store.clone()))
            .and_then(handle_get_primary);

        let set_primary = warp::path!("payment-methods" / Uuid / Uuid / "primary")
            .and(warp::put())
            .and(authenticated(authenticator.clone()))
            .and(with_state(store.clone()))
            .and_then(handle_set_primary);

        let remove = warp::path!("payment-methods" / Uuid / Uuid)
            .and(warp::delete())
            .and(authenticated(authenticator))
            .and(with_state(store))
            .and_then(handle_remove_payment_method);

        add.or(list).or(primary).or(set_primary).or(remove)
    }
}
