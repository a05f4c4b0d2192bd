//! Health check handler module

use std::sync::Arc;

use warp::http::StatusCode;
use warp::Reply;

use crate::application::use_cases::HealthCheckUseCase;
use crate::infrastructure::http::responses::ResponseFormatter;

/// Handle health check requests
pub async fn handle_health_request(health_use_case: Arc<HealthCheckUseCase>) -> Result<impl Reply, warp::Rejection> {
    let reply = match health_use_case.execute().await {
        Ok(health) => {
            let status = StatusCode::from_u16(health.http_status_code()).unwrap_or(StatusCode::OK);
            ResponseFormatter::json_with_status(&health, status)
        }
        Err(e) => ResponseFormatter::from_app_error(&e),
    };
    Ok(reply)
}
