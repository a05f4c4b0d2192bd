//! Mandate handlers

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::Reply;

use crate::application::services::{InitiateMandateRequest, MandateOrchestrator, MandateReconciler};
use crate::domain::auth::Caller;
use crate::infrastructure::http::responses::ResponseFormatter;

pub async fn handle_initiate_mandate(
    caller: Caller,
    body: InitiateMandateRequest,
    orchestrator: Arc<MandateOrchestrator>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        orchestrator.authorize_order(&caller, body.order_id).await?;
        orchestrator.initiate(body).await
    }
    .await;
    Ok(ResponseFormatter::respond("mandates.initiate", started, result, StatusCode::CREATED))
}

pub async fn handle_mandate_status(
    order_id: Uuid,
    caller: Caller,
    orchestrator: Arc<MandateOrchestrator>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        orchestrator.authorize_order(&caller, order_id).await?;
        orchestrator.status(order_id).await
    }
    .await;
    Ok(ResponseFormatter::respond("mandates.status", started, result, StatusCode::OK))
}

/// Expire overdue requests; driven by the external sweeper
pub async fn handle_mandate_sweep(
    caller: Caller,
    reconciler: Arc<MandateReconciler>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_service()?;
        reconciler.expire_overdue(Utc::now()).await
    }
    .await
    .map(|expired| json!({ "expired": expired }));
    Ok(ResponseFormatter::respond("mandates.sweep", started, result, StatusCode::OK))
}

pub async fn handle_load_report(
    order_id: Uuid,
    caller: Caller,
    orchestrator: Arc<MandateOrchestrator>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_service()?;
        orchestrator.load_report(order_id).await
    }
    .await;
    Ok(ResponseFormatter::respond("mandates.load_report", started, result, StatusCode::OK))
}
