//! Response envelopes produced by the pipeline itself.
//!
//! # Responsibilities
//! - Validation failure bodies (opaque or detailed)
//! - Fault bodies for failed or panicking controllers
//! - Oversized or unreadable request bodies
//!
//! # Design Decisions
//! - The opaque validation envelope is `{"error": true}` with status 200,
//!   matching what existing clients check for
//! - Fault bodies carry the raw error text unless configured otherwise

use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::schema::ValidationError;

/// Answer for a request that failed schema validation.
pub fn validation_failure(err: &ValidationError, detailed: bool) -> Response {
    if detailed {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "code": "validation_error",
                "message": err.to_string(),
                "details": err.violations,
            })),
        )
            .into_response()
    } else {
        (StatusCode::OK, Json(json!({ "error": true }))).into_response()
    }
}

/// Answer for a controller that returned an error or panicked.
pub fn fault(message: &str, expose: bool) -> Response {
    let body = if expose {
        message.to_string()
    } else {
        "Internal Server Error".to_string()
    };
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

pub fn body_too_large(limit: usize) -> Response {
    (
        StatusCode::PAYLOAD_TOO_LARGE,
        format!("request body exceeds {limit} bytes"),
    )
        .into_response()
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "controller panicked".to_string()
    }
}
