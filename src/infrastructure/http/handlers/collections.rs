//! Collection batch handlers; service callers only

use std::sync::Arc;
use std::time::Instant;

use warp::http::StatusCode;
use warp::Reply;

use crate::application::services::{FailedCollectionReport, FallbackEngine, UncollectableSweepRequest};
use crate::domain::auth::Caller;
use crate::infrastructure::http::responses::ResponseFormatter;

/// Failed debit report from the collection batch
pub async fn handle_failed_collection(
    caller: Caller,
    body: FailedCollectionReport,
    fallback: Arc<FallbackEngine>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_service()?;
        fallback.handle_failed_collection(body).await
    }
    .await;
    Ok(ResponseFormatter::respond("collections.failed", started, result, StatusCode::OK))
}

/// Pay Now links for invoices the debit run cannot collect
pub async fn handle_uncollectable_sweep(
    caller: Caller,
    body: UncollectableSweepRequest,
    fallback: Arc<FallbackEngine>,
) -> Result<impl Reply, warp::Rejection> {
    let started = Instant::now();
    let result = async {
        caller.require_service()?;
        fallback.sweep_uncollectable(body).await
    }
    .await;
    Ok(ResponseFormatter::respond("collections.uncollectable", started, result, StatusCode::OK))
}
