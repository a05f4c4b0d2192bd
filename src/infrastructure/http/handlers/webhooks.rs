//! Gateway webhook handlers
//!
//! Bodies arrive as raw bytes so the signature is checked over exactly
//! what the gateway sent.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use warp::http::StatusCode;
use warp::Reply;

use crate::application::services::WebhookIngress;
use crate::infrastructure::http::responses::ResponseFormatter;

pub async fn handle_mandate_postback(
    signature: Option<String>,
    body: Bytes,
    ingress: Arc<WebhookIngress>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = ingress.handle_mandate(&body, signature.as_deref()).await;
    Ok(ResponseFormatter::respond("webhooks.mandate", started, result, StatusCode::OK))
}

pub async fn handle_pay_now_notice(
    signature: Option<String>,
    body: Bytes,
    ingress: Arc<WebhookIngress>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = ingress.handle_pay_now(&body, signature.as_deref()).await;
    Ok(ResponseFormatter::respond("webhooks.paynow", started, result, StatusCode::OK))
}
