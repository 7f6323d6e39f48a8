//! Error and confirmation bodies shared by every handler.
//!
//! The wire contract distinguishes four failure shapes: 401 for a missing or
//! invalid token, 403 for a rule violation against an existing resource, 404
//! for a missing id, and 500 for store failures. Validation errors carry
//! their own 422 payload (see `validation`).

use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn unauthenticated() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Unauthenticated" })),
    )
}

pub fn forbidden() -> ApiError {
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "message": "Unauthorized" })),
    )
}

pub fn not_found(resource: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": format!("{} not found", resource) })),
    )
}

/// Store failures surface as a generic 500; the cause goes to the log, not
/// the client.
pub fn server_error<E: std::fmt::Display>(context: &str, err: E) -> ApiError {
    log::error!("{}: {}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Server error" })),
    )
}

pub fn deleted(resource: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": format!("{} deleted successfully", resource) }))
}
