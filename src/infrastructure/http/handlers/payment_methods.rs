//! Payment method handlers
//!
//! Every operation is scoped to the customer in the path, which must be the
//! caller unless the caller is a service.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::Reply;

use crate::application::services::{AddPaymentMethodRequest, PaymentMethodStore};
use crate::domain::auth::Caller;
use crate::infrastructure::http::responses::ResponseFormatter;

pub async fn handle_add_payment_method(
    customer_id: Uuid,
    caller: Caller,
    body: AddPaymentMethodRequest,
    store: Arc<PaymentMethodStore>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_customer(customer_id)?;
        store.add(customer_id, body).await
    }
    .await;
    Ok(ResponseFormatter::respond("payment_methods.add", started, result, StatusCode::CREATED))
}

pub async fn handle_list_payment_methods(
    customer_id: Uuid,
    caller: Caller,
    store: Arc<PaymentMethodStore>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_customer(customer_id)?;
        store.list(customer_id).await
    }
    .await;
    Ok(ResponseFormatter::respond("payment_methods.list", started, result, StatusCode::OK))
}

pub async fn handle_get_primary(
    customer_id: Uuid,
    caller: Caller,
    store: Arc<PaymentMethodStore>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_customer(customer_id)?;
        store.get_primary(customer_id).await
    }
    .await;
    Ok(ResponseFormatter::respond("payment_methods.primary", started, result, StatusCode::OK))
}

pub async fn handle_set_primary(
    customer_id: Uuid,
    method_id: Uuid,
    caller: Caller,
    store: Arc<PaymentMethodStore>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_customer(customer_id)?;
        store.set_primary(customer_id, method_id).await
    }
    .await;
    Ok(ResponseFormatter::respond("payment_methods.set_primary", started, result, StatusCode::OK))
}

pub async fn handle_remove_payment_method(
    customer_id: Uuid,
    method_id: Uuid,
    caller: Caller,
    store: Arc<PaymentMethodStore>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_customer(customer_id)?;
        store.remove(customer_id, method_id).await
    }
    .await
    .map(|()| json!({ "removed": true, "id": method_id }));
    Ok(ResponseFormatter::respond("payment_methods.remove", started, result, StatusCode::OK))
}
