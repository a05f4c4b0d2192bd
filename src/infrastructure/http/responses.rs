//! HTTP responses module
//!
//! JSON reply formatting and rejection recovery. Error bodies only ever
//! carry the public message; the full error goes to the log.

use std::convert::Infallible;
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

use crate::shared::error::{AppError, AppResult};
use crate::shared::logging::LoggingUtils;

/// Response formatter for HTTP responses
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn json_with_status<T: Serialize>(body: &T, status: StatusCode) -> WithStatus<Json> {
        warp::reply::with_status(warp::reply::json(body), status)
    }

    /// `{"error": ...}` with the mapped status
    pub fn from_app_error(error: &AppError) -> WithStatus<Json> {
        Self::json_with_status(&json!({ "error": error.public_message() }), error.http_status_code())
    }

    /// Log the outcome of an operation and shape it into a reply
    pub fn respond<T: Serialize>(
        operation: &str,
        started: Instant,
        result: AppResult<T>,
        success: StatusCode,
    ) -> WithStatus<Json> {
        let request_id = LoggingUtils::generate_request_id();
        let elapsed = started.elapsed().as_millis() as u64;
        match result {
            Ok(body) => {
                LoggingUtils::log_success(&request_id, operation, elapsed);
                Self::json_with_status(&body, success)
            }
            Err(e) => {
                LoggingUtils::log_error(&request_id, operation, &e, elapsed);
                Self::from_app_error(&e)
            }
        }
    }
}

/// Turn warp's own rejections into the same error shape as handler errors
pub async fn handle_rejection(rejection: warp::Rejection) -> Result<WithStatus<Json>, Infallible> {
    let (status, message) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "The requested record could not be found".to_string())
    } else if let Some(e) = rejection.find::<AppError>() {
        (e.http_status_code(), e.public_message())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid request body: {}", e))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Request body is too large".to_string())
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        tracing::warn!(rejection = ?rejection, "Unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Could not complete the request".to_string())
    };
    Ok(ResponseFormatter::json_with_status(&json!({ "error": message }), status))
}
